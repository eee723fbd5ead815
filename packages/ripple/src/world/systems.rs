//! System registration, scheduling and activation.

use std::any::TypeId;
use std::collections::HashMap;
use std::time::Instant;

use tracing::debug;

use crate::component::ComponentID;
use crate::context::{AccessKind, ContextID};
use crate::diagnostics::SmoothCounter;
use crate::sorted_vec::VecSet;
use crate::system::{Phase, System, SystemDescriptor, SystemID};
use crate::world::World;

struct SystemSlot {
    system: Option<Box<dyn System>>,
    name: &'static str,
    context: ContextID,
    roles: Vec<Phase>,
    watch: Vec<ComponentID>,
    messages: Vec<ComponentID>,
    accesses: Vec<(AccessKind, ComponentID)>,
    do_not_pause: bool,
    include_on_pause: bool,
    active: bool,
    started: bool,
}

struct Paused {
    deactivated: Vec<SystemID>,
    activated: Vec<SystemID>,
}

/// Every system registered with a world, in execution order.
pub(crate) struct Systems {
    slots: Vec<SystemSlot>,
    by_type: HashMap<TypeId, SystemID>,
    phases: HashMap<Phase, VecSet<SystemID>>,
    pending: Vec<(SystemID, bool)>,
    paused: Option<Paused>,
}

impl Systems {
    pub fn new() -> Systems {
        Systems {
            slots: Vec::new(),
            by_type: HashMap::new(),
            phases: HashMap::new(),
            pending: Vec::new(),
            paused: None,
        }
    }

    /// Return every system ID in execution order.
    pub fn ids(&self) -> Vec<SystemID> {
        (0..self.slots.len()).map(SystemID::new).collect()
    }

    pub fn is_active(&self, id: SystemID) -> bool {
        self.slots.get(id.id()).map_or(false, |s| s.active)
    }

    /// Return the active systems playing a phase, in execution order.
    pub fn in_phase(&self, phase: Phase) -> Vec<SystemID> {
        self.phases.get(&phase).map_or_else(Vec::new, |ids| ids.to_vec())
    }

    pub fn context(&self, id: SystemID) -> ContextID {
        self.slots[id.id()].context
    }

    pub fn name(&self, id: SystemID) -> &'static str {
        self.slots[id.id()].name
    }

    pub fn accesses(&self, id: SystemID) -> &[(AccessKind, ComponentID)] {
        &self.slots[id.id()].accesses
    }

    /// Take a system out of its slot while it runs.
    ///
    /// Returns `None` if it is already running further up the stack.
    fn take(&mut self, id: SystemID) -> Option<Box<dyn System>> {
        self.slots.get_mut(id.id()).and_then(|s| s.system.take())
    }

    fn restore(&mut self, id: SystemID, system: Box<dyn System>) {
        self.slots[id.id()].system = Some(system);
    }
}

fn plays(system: &mut dyn System, phase: Phase) -> bool {
    match phase {
        Phase::Startup => system.as_startup().is_some(),
        Phase::Update => system.as_update().is_some(),
        Phase::FixedUpdate => system.as_fixed_update().is_some(),
        Phase::Render => system.as_render().is_some(),
        Phase::Exit => system.as_exit().is_some(),
        Phase::Reactive => system.as_reactive().is_some() || system.as_messager().is_some(),
    }
}

impl World {
    pub(crate) fn register_system(&mut self, descriptor: SystemDescriptor, active: bool) -> SystemID {
        let id = SystemID::new(self.systems.slots.len());
        let context = self.context_for(descriptor.context_filter());

        let SystemDescriptor {
            mut system,
            type_id,
            name,
            accesses,
            watch,
            messages,
            do_not_pause,
            include_on_pause,
            ..
        } = descriptor;

        let ctx = &mut self.contexts[context.id()];
        for target in watch.iter() {
            ctx.watcher_mut(*target);
        }
        for target in messages.iter() {
            ctx.message_watcher_mut(*target);
        }

        let roles = Phase::SCHEDULED.iter()
            .copied()
            .filter(|phase| plays(&mut *system, *phase))
            .collect();

        self.systems.slots.push(SystemSlot {
            system: Some(system),
            name,
            context,
            roles,
            watch,
            messages,
            accesses,
            do_not_pause,
            include_on_pause,
            active: false,
            started: false,
        });
        self.systems.by_type.insert(type_id, id);

        if active {
            self.activate_by_id(id);
        }
        id
    }

    /// Run a system with the world, recording its counter if enabled.
    fn run_system(&mut self, id: SystemID, phase: Phase, f: impl FnOnce(&mut dyn System, &mut World, ContextID)) {
        let mut system = match self.systems.take(id) {
            Some(s) => s,
            None => return,
        };
        let context = self.systems.context(id);

        let start = if self.settings.diagnostics { Some(Instant::now()) } else { None };
        f(&mut *system, self, context);
        self.systems.restore(id, system);

        if let Some(start) = start {
            let entities = self.contexts[context.id()].len();
            let samples = self.settings.counter_samples;
            self.counters.entry((id, phase))
                .or_insert_with(|| SmoothCounter::new(samples))
                .record(start.elapsed(), entities);
        }
    }

    pub(crate) fn run_phase(&mut self, phase: Phase) {
        for id in self.systems.in_phase(phase) {
            // A system earlier in the phase may have deactivated this one.
            if !self.systems.is_active(id) {
                continue;
            }

            self.run_system(id, phase, |system, world, context| match phase {
                Phase::Update => if let Some(s) = system.as_update() { s.update(world, context) },
                Phase::FixedUpdate => if let Some(s) = system.as_fixed_update() { s.fixed_update(world, context) },
                Phase::Render => if let Some(s) = system.as_render() { s.render(world, context) },
                Phase::Exit => if let Some(s) = system.as_exit() { s.exit(world, context) },
                Phase::Startup | Phase::Reactive => {}
            });
        }
    }

    /// Run a system's startup hook if it has not run yet.
    pub(crate) fn run_start(&mut self, id: SystemID) {
        let slot = &mut self.systems.slots[id.id()];
        if slot.started {
            return;
        }
        slot.started = true;

        self.run_system(id, Phase::Startup, |system, world, context| {
            if let Some(s) = system.as_startup() {
                s.start(world, context);
            }
        });
    }

    /// Hand a sweep's batch to a reactive system.
    pub(crate) fn run_reactive(&mut self, id: SystemID, f: impl FnOnce(&mut dyn System, &mut World)) {
        self.run_system(id, Phase::Reactive, |system, world, _| f(system, world));
    }

    fn activate_by_id(&mut self, id: SystemID) -> bool {
        let slot = &mut self.systems.slots[id.id()];
        if slot.active {
            return false;
        }
        slot.active = true;

        for phase in slot.roles.iter() {
            self.systems.phases.entry(*phase).or_default().insert(id);
        }

        let ctx = &mut self.contexts[slot.context.id()];
        for target in slot.watch.iter() {
            ctx.watcher_mut(*target).subscribe(id);
        }
        for target in slot.messages.iter() {
            ctx.message_watcher_mut(*target).subscribe(id);
        }

        debug!(system = slot.name, "activated system");

        if self.started {
            self.run_start(id);
        }
        true
    }

    fn deactivate_by_id(&mut self, id: SystemID) -> bool {
        let slot = &mut self.systems.slots[id.id()];
        if !slot.active {
            return false;
        }
        slot.active = false;

        for phase in slot.roles.iter() {
            if let Some(ids) = self.systems.phases.get_mut(phase) {
                ids.remove(&id);
            }
        }

        let ctx = &mut self.contexts[slot.context.id()];
        for target in slot.watch.iter() {
            ctx.watcher_mut(*target).unsubscribe(id);
        }
        for target in slot.messages.iter() {
            ctx.message_watcher_mut(*target).unsubscribe(id);
        }

        debug!(system = slot.name, "deactivated system");
        true
    }

    /// Get the ID of a registered system.
    pub fn system_id<S: System>(&self) -> Option<SystemID> {
        self.systems.by_type.get(&TypeId::of::<S>()).copied()
    }

    /// Get the name of a registered system.
    pub fn system_name(&self, id: SystemID) -> &'static str {
        self.systems.name(id)
    }

    /// Get the component accesses a system declared.
    pub fn system_accesses(&self, id: SystemID) -> &[(AccessKind, ComponentID)] {
        self.systems.accesses(id)
    }

    /// Returns true if system `S` is registered and active.
    pub fn is_system_active<S: System>(&self) -> bool {
        self.system_id::<S>().map_or(false, |id| self.systems.is_active(id))
    }

    /// Activate system `S` at the end of the current tick.
    ///
    /// Returns false if `S` is not registered.
    pub fn activate_system<S: System>(&mut self) -> bool {
        self.queue_activation::<S>(true)
    }

    /// Deactivate system `S` at the end of the current tick.
    pub fn deactivate_system<S: System>(&mut self) -> bool {
        self.queue_activation::<S>(false)
    }

    fn queue_activation<S: System>(&mut self, active: bool) -> bool {
        match self.system_id::<S>() {
            Some(id) => {
                self.systems.pending.push((id, active));
                true
            }
            None => false,
        }
    }

    /// Activate system `S` now.
    ///
    /// If the world has started and `S` has never run its startup hook, it
    /// runs before this returns. Returns false if `S` is not registered or
    /// was already active.
    pub fn activate_system_immediately<S: System>(&mut self) -> bool {
        self.system_id::<S>().map_or(false, |id| self.activate_by_id(id))
    }

    /// Deactivate system `S` now.
    pub fn deactivate_system_immediately<S: System>(&mut self) -> bool {
        self.system_id::<S>().map_or(false, |id| self.deactivate_by_id(id))
    }

    /// Apply queued activation requests in the order they were made.
    pub(crate) fn flush_activation(&mut self) {
        let pending = std::mem::take(&mut self.systems.pending);
        for (id, active) in pending {
            if active {
                self.activate_by_id(id);
            } else {
                self.deactivate_by_id(id);
            }
        }
    }

    /// Pause the world.
    ///
    /// Every active update or fixed update system is deactivated unless it
    /// was registered with `do_not_pause`, and every `include_on_pause`
    /// system is activated.
    pub fn pause(&mut self) {
        if self.systems.paused.is_some() {
            return;
        }

        let mut paused = Paused {
            deactivated: Vec::new(),
            activated: Vec::new(),
        };

        for id in self.systems.ids() {
            let slot = &self.systems.slots[id.id()];
            let include = slot.include_on_pause;
            let exempt = slot.do_not_pause
                || !slot.roles.iter().any(|p| matches!(p, Phase::Update | Phase::FixedUpdate));

            if include {
                if self.activate_by_id(id) {
                    paused.activated.push(id);
                }
            } else if !exempt && self.deactivate_by_id(id) {
                paused.deactivated.push(id);
            }
        }

        debug!(deactivated = paused.deactivated.len(), activated = paused.activated.len(), "paused world");
        self.systems.paused = Some(paused);
    }

    /// Resume the world, reversing exactly what `pause` changed.
    pub fn resume(&mut self) {
        let paused = match self.systems.paused.take() {
            Some(p) => p,
            None => return,
        };

        for id in paused.activated {
            self.deactivate_by_id(id);
        }
        for id in paused.deactivated {
            self.activate_by_id(id);
        }
        debug!("resumed world");
    }

    pub fn is_paused(&self) -> bool {
        self.systems.paused.is_some()
    }
}
