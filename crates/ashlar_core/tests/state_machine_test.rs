//! Integration tests for state machines driving family membership.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use ashlar_core::ecs::same_component;
use ashlar_core::{
    Component, ComponentEvent, ComponentType, EcsError, Engine, Entity, EntityStateMachine,
    ErasedComponent, InstanceProvider, NodeShape, NodeType,
};

#[derive(Default)]
struct Patrol;
impl Component for Patrol {}

#[derive(Default)]
struct Chase;
impl Component for Chase {}

struct Speed(f32);
impl Component for Speed {}

struct Patrolling;
impl NodeType for Patrolling {
    fn shape() -> NodeShape {
        NodeShape::builder().field::<Patrol>("patrol").build()
    }
}

struct Chasing;
impl NodeType for Chasing {
    fn shape() -> NodeShape {
        NodeShape::builder()
            .field::<Chase>("chase")
            .field::<Speed>("speed")
            .build()
    }
}

#[test]
fn test_state_changes_move_entity_between_families() {
    let engine = Engine::new();
    let patrolling = engine.node_list::<Patrolling>();
    let chasing = engine.node_list::<Chasing>();

    let guard = Entity::named("guard");
    engine.add_entity(&guard).unwrap();

    let mut fsm = EntityStateMachine::new(guard.clone());
    fsm.create_state("patrol")
        .add_default::<Patrol>()
        .add::<Speed>()
        .with_method(|| Speed(1.0));
    fsm.create_state("chase")
        .add_default::<Chase>()
        .add::<Speed>()
        .with_method(|| Speed(4.0));

    fsm.change_state("patrol").unwrap();
    assert_eq!(patrolling.len(), 1);
    assert!(chasing.is_empty());

    fsm.change_state("chase").unwrap();
    assert!(patrolling.is_empty());
    assert_eq!(chasing.len(), 1);
    let node = chasing.head().unwrap();
    assert_eq!(node.get::<Speed>().unwrap().borrow().0, 4.0);
    assert_eq!(fsm.current_state(), Some("chase"));
}

#[test]
fn test_shared_instance_survives_state_change() {
    let guard = Entity::new();
    let removals = Rc::new(Cell::new(0));
    let counter = Rc::clone(&removals);
    guard
        .component_removed()
        .add(move |_: &ComponentEvent| counter.set(counter.get() + 1));

    let speed = Rc::new(RefCell::new(Speed(2.0)));
    let mut fsm = EntityStateMachine::new(guard.clone());
    fsm.create_state("patrol")
        .add_default::<Patrol>()
        .add::<Speed>()
        .with_provider(Rc::new(InstanceProvider::shared(Rc::clone(&speed))));
    fsm.create_state("alert")
        .add::<Speed>()
        .with_provider(Rc::new(InstanceProvider::shared(Rc::clone(&speed))));

    fsm.change_state("patrol").unwrap();
    fsm.change_state("alert").unwrap();

    // only Patrol was removed; the shared Speed stayed in place
    assert_eq!(removals.get(), 1);
    assert!(same_component(
        &guard.get_type(ComponentType::of::<Speed>()).unwrap(),
        &(speed as ErasedComponent),
    ));
}

#[test]
fn test_unknown_state_leaves_entity_untouched() {
    let guard = Entity::new();
    let mut fsm = EntityStateMachine::new(guard.clone());
    fsm.create_state("patrol").add_default::<Patrol>();
    fsm.change_state("patrol").unwrap();

    let outcome = fsm.change_state("sleep");
    assert_eq!(
        outcome,
        Err(EcsError::UnknownState {
            name: "sleep".to_string()
        })
    );
    assert!(guard.has::<Patrol>());
    assert_eq!(fsm.current_state(), Some("patrol"));
}
