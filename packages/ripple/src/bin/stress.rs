use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use ripple::{
    component,
    AccessKind,
    ComponentsLookup,
    ContextID,
    EntityID,
    FilterKind,
    ReactiveSystem,
    System,
    SystemDescriptor,
    UpdateSystem,
    World,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Velocity(f32);

component!(Velocity);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Distance(f32);

component!(Distance);

struct Mover;

impl System for Mover {
    fn as_update(&mut self) -> Option<&mut dyn UpdateSystem> { Some(self) }
}

impl UpdateSystem for Mover {
    fn update(&mut self, world: &mut World, context: ContextID) {
        let dt = world.delta_time().as_secs_f32();
        for entity in world.context(context).entities().iter() {
            let velocity = world.entity(*entity).get::<Velocity>().0;
            let distance = world.entity(*entity).get::<Distance>().0;
            world.entity_mut(*entity).replace(Distance(distance + velocity * dt));
        }
    }
}

static MODIFIED: AtomicUsize = AtomicUsize::new(0);

struct Counter;

impl System for Counter {
    fn as_reactive(&mut self) -> Option<&mut dyn ReactiveSystem> { Some(self) }
}

impl ReactiveSystem for Counter {
    fn on_modified(&mut self, _world: &mut World, entities: &[EntityID]) {
        MODIFIED.fetch_add(entities.len(), Ordering::Relaxed);
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let lookup = ComponentsLookup::builder()
        .component::<Velocity>()
        .component::<Distance>()
        .build();
    let velocity = lookup.id::<Velocity>();
    let distance = lookup.id::<Distance>();

    let mut world = World::builder()
        .lookup(lookup)
        .system(SystemDescriptor::new(Mover)
                    .filter(FilterKind::AllOf, AccessKind::Read, &[velocity])
                    .filter(FilterKind::AllOf, AccessKind::Write, &[distance]), true)
        .system(SystemDescriptor::new(Counter)
                    .filter(FilterKind::AllOf, AccessKind::Read, &[distance])
                    .watch(&[distance]), true)
        .build()?;

    for i in 0..4096 {
        world.build_entity()
            .with(Velocity(1.0 + (i % 7) as f32))
            .with(Distance(0.0))
            .spawn();
    }
    world.start();

    let start = Instant::now();
    for _ in 0..64 {
        world.update(Duration::from_millis(16));
    }

    println!("64 ticks over {} entities in {:?}", world.all_entities().len(), start.elapsed());
    println!("modified notifications: {}", MODIFIED.load(Ordering::Relaxed));
    Ok(())
}
