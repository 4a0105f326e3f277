//! Integration tests for the engine's entity, family and signal contracts.

use std::cell::Cell;
use std::rc::Rc;

use ashlar_core::{Component, Engine, Entity, Listener, NodeShape, NodeType, Signal0};

#[derive(Debug, PartialEq)]
struct Position {
    x: f32,
    y: f32,
}
impl Component for Position {}

struct Velocity {
    dx: f32,
}
impl Component for Velocity {}

struct Cargo(u32);
impl Component for Cargo {}

struct Unrelated;
impl Component for Unrelated {}

struct PositionNode;
impl NodeType for PositionNode {
    fn shape() -> NodeShape {
        NodeShape::builder().field::<Position>("position").build()
    }
}

struct MotionNode;
impl NodeType for MotionNode {
    fn shape() -> NodeShape {
        NodeShape::builder()
            .field::<Position>("position")
            .field::<Velocity>("velocity")
            .build()
    }
}

#[test]
fn test_single_entity_joins_and_leaves() {
    let engine = Engine::new();
    let e1 = Entity::named("e1");
    e1.add(Position { x: 0.0, y: 0.0 });
    engine.add_entity(&e1).unwrap();

    let nodes = engine.node_list::<PositionNode>();
    let head = nodes.head().unwrap();
    assert_eq!(head.entity().unwrap().name(), "e1");

    e1.remove::<Position>();
    assert!(nodes.is_empty());
}

#[test]
fn test_listener_added_twice_fires_once() {
    let signal = Signal0::new();
    let calls = Rc::new(Cell::new(0));
    let sink = Rc::clone(&calls);
    let listener = Listener::new(move |_: &()| sink.set(sink.get() + 1));

    signal.add(listener.clone());
    signal.add(listener);
    signal.dispatch(&());
    assert_eq!(calls.get(), 1);
}

#[test]
fn test_interleaved_entities_keep_insertion_order() {
    let engine = Engine::new();
    let cargo = engine.get_node_list(&NodeShape::builder().field::<Cargo>("cargo").build());

    let mut expected = Vec::new();
    for i in 0..5 {
        let carrier = Entity::named(format!("carrier{i}"));
        carrier.add(Cargo(i));
        engine.add_entity(&carrier).unwrap();
        expected.push(carrier);

        let bystander = Entity::named(format!("bystander{i}"));
        bystander.add(Unrelated);
        engine.add_entity(&bystander).unwrap();
    }

    let matched: Vec<_> = cargo.iter().filter_map(|node| node.entity()).collect();
    assert_eq!(matched, expected);
}

#[test]
fn test_add_then_get_and_replace() {
    let entity = Entity::new();
    entity.add(Position { x: 1.0, y: 1.0 });
    assert!(entity.has::<Position>());
    assert_eq!(*entity.get::<Position>().unwrap().borrow(), Position { x: 1.0, y: 1.0 });

    entity.add(Position { x: 2.0, y: 3.0 });
    assert_eq!(*entity.get::<Position>().unwrap().borrow(), Position { x: 2.0, y: 3.0 });
    assert_eq!(entity.get_all().len(), 1);

    entity.remove::<Position>();
    assert!(!entity.has::<Position>());
    assert!(entity.get::<Position>().is_none());
}

#[test]
fn test_family_membership_tracks_both_components() {
    let engine = Engine::new();
    let nodes = engine.node_list::<MotionNode>();
    let entity = Entity::new();
    engine.add_entity(&entity).unwrap();

    entity.add(Position { x: 0.0, y: 0.0 });
    assert!(nodes.is_empty());
    entity.add(Velocity { dx: 1.0 });
    assert_eq!(nodes.len(), 1);

    // replacing a required component never duplicates the node
    entity.add(Velocity { dx: 5.0 });
    assert_eq!(nodes.len(), 1);
    let node = nodes.head().unwrap();
    assert_eq!(node.get::<Velocity>().unwrap().borrow().dx, 5.0);

    entity.remove::<Position>();
    assert!(nodes.is_empty());
    entity.add(Position { x: 1.0, y: 0.0 });
    assert_eq!(nodes.len(), 1);

    engine.remove_entity(&entity);
    assert!(nodes.is_empty());
}

#[test]
fn test_node_fields_alias_entity_components() {
    let engine = Engine::new();
    let nodes = engine.node_list::<MotionNode>();
    let entity = Entity::new();
    entity.add(Position { x: 0.0, y: 0.0 }).add(Velocity { dx: 2.0 });
    engine.add_entity(&entity).unwrap();

    for node in &nodes {
        let position = node.field::<Position>("position").unwrap();
        let velocity = node.field::<Velocity>("velocity").unwrap();
        position.borrow_mut().x += velocity.borrow().dx;
    }
    assert_eq!(entity.get::<Position>().unwrap().borrow().x, 2.0);
}

#[test]
fn test_engine_signals() {
    let engine = Engine::new();
    let added = Rc::new(Cell::new(0));
    let removed = Rc::new(Cell::new(0));
    let (a, r) = (Rc::clone(&added), Rc::clone(&removed));
    engine.entity_added().add(move |_: &Entity| a.set(a.get() + 1));
    engine.entity_removed().add(move |_: &Entity| r.set(r.get() + 1));

    let entity = Entity::new();
    engine.add_entity(&entity).unwrap();
    assert!(engine.add_entity(&entity).is_err());
    engine.remove_entity(&entity);
    engine.remove_entity(&entity);

    assert_eq!(added.get(), 1);
    assert_eq!(removed.get(), 1);
}

#[test]
fn test_entity_can_move_between_engines() {
    let first = Engine::new();
    let second = Engine::new();
    let first_nodes = first.node_list::<PositionNode>();
    let second_nodes = second.node_list::<PositionNode>();

    let entity = Entity::named("traveller");
    entity.add(Position { x: 0.0, y: 0.0 });
    first.add_entity(&entity).unwrap();
    assert!(second.add_entity(&entity).is_err());

    first.remove_entity(&entity);
    second.add_entity(&entity).unwrap();
    assert!(first_nodes.is_empty());
    assert_eq!(second_nodes.len(), 1);

    entity.remove::<Position>();
    assert!(second_nodes.is_empty());
}

#[test]
fn test_serialization_surface() {
    let engine = Engine::new();
    for i in 0..3 {
        let entity = Entity::named(format!("saved{i}"));
        entity.add(Cargo(i)).add(Position { x: i as f32, y: 0.0 });
        engine.add_entity(&entity).unwrap();
    }

    // capture names and components, rebuild into a fresh engine
    let restored = Engine::new();
    for entity in engine.entities() {
        let copy = Entity::named(entity.name());
        for (key, component) in entity.get_all() {
            copy.add_erased(key, component);
        }
        restored.add_entity(&copy).unwrap();
    }

    assert_eq!(restored.entity_count(), 3);
    let saved = restored.entity_by_name("saved2").unwrap();
    assert_eq!(saved.get::<Cargo>().unwrap().borrow().0, 2);
    assert_eq!(restored.node_list::<PositionNode>().len(), 3);
}
