use std::time::Duration;

use ripple::{
    component,
    AccessKind,
    ComponentsLookup,
    EntityID,
    FilterKind,
    Position,
    ReactiveSystem,
    Routine,
    State,
    StateMachine,
    StateMachineComponent,
    StateMachineSystem,
    System,
    SystemDescriptor,
    Wait,
    World,
    WorldSettings,
};

#[derive(Debug, Clone, PartialEq)]
pub struct Health(i32);

component!(Health);

struct HealthReporter;

impl System for HealthReporter {
    fn as_reactive(&mut self) -> Option<&mut dyn ReactiveSystem> { Some(self) }
}

impl ReactiveSystem for HealthReporter {
    fn on_added(&mut self, world: &mut World, entities: &[EntityID]) {
        for entity in entities {
            println!("added: {} {:?}", entity, world.entity(*entity).get::<Health>());
        }
    }

    fn on_modified(&mut self, world: &mut World, entities: &[EntityID]) {
        for entity in entities {
            println!("modified: {} {:?}", entity, world.entity(*entity).get::<Health>());
        }
    }

    fn on_removed(&mut self, _world: &mut World, entities: &[EntityID]) {
        println!("removed: {:?}", entities);
    }
}

/// Loses one health every 100ms until it runs out.
struct Bleed;

impl StateMachine for Bleed {
    fn initial_state(&self) -> State<Self> {
        Bleed::bleeding
    }
}

impl Bleed {
    fn bleeding(_: &mut Bleed) -> Routine<Bleed> {
        Routine::new("bleeding", |_: &mut Bleed, step| {
            let entity = step.entity();
            let health = step.world().entity(entity).get::<Health>().0 - 1;
            if health <= 0 {
                step.entity_mut().destroy();
                return Ok(Wait::Stop);
            }

            step.entity_mut().replace(Health(health));
            Ok(Wait::For(Duration::from_millis(100)))
        })
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let lookup = ComponentsLookup::builder()
        .component::<Health>()
        .build();
    let health = lookup.id::<Health>();

    let mut world = World::builder()
        .lookup(lookup)
        .settings(WorldSettings::from_toml_str("diagnostics = true")?)
        .system(StateMachineSystem::descriptor(), true)
        .system(SystemDescriptor::new(HealthReporter)
                    .filter(FilterKind::AllOf, AccessKind::Read, &[health])
                    .watch(&[health]), true)
        .build()?;

    let parent = world.build_entity()
        .with(Position::new(10.0, 0.0))
        .with(Health(3))
        .with(StateMachineComponent::new(Bleed))
        .spawn();
    let child = world.build_entity()
        .with(Position::new(1.0, 2.0))
        .spawn();
    world.entity_mut(parent).add_child(child, Some("hand"));

    world.start();
    println!("child position: {:?}", world.entity(child).get::<Position>().global());

    for _ in 0..5 {
        world.update(Duration::from_millis(100));
    }

    println!("entities left: {:?}", world.all_entities());
    if let Some(id) = world.system_id::<HealthReporter>() {
        for (phase, counter) in world.counters(id) {
            println!("{:?}: {:?} over {} samples", phase, counter.average_duration(), counter.len());
        }
    }

    Ok(())
}
