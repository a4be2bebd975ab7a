mod common;

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use common::{attrs, count, init_tracing, record, validated_kind};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use strata_model::{
    Callback, ClientId, CollectionKind, CollectionSchema, Comparator, Entity, EntityBehavior,
    EntityCollection, EntityKind, EntitySchema, Error, Item, ModelEvent, Options, names,
};

fn id_of(entity: &Entity) -> i64 {
    entity.get("id").and_then(|id| id.as_i64()).unwrap_or(-1)
}

fn ids(collection: &EntityCollection) -> Vec<i64> {
    collection.map(id_of)
}

fn labels(collection: &EntityCollection) -> Vec<String> {
    collection.map(|entity| {
        entity
            .get("label")
            .and_then(|label| label.as_str().map(str::to_owned))
            .unwrap_or_default()
    })
}

/// Four entities with descending ids 3..0 and labels a..d.
fn fixture() -> (EntityCollection, Vec<Entity>) {
    let entities: Vec<Entity> = [(3, "a"), (2, "b"), (1, "c"), (0, "d")]
        .into_iter()
        .map(|(id, label)| Entity::from_attributes(json!({"id": id, "label": label})))
        .collect();
    let collection =
        EntityCollection::with_entities(&CollectionKind::default(), entities.clone(), Options::default());
    (collection, entities)
}

fn sorted_by(attr: &str) -> CollectionKind {
    CollectionKind::from_schema(
        CollectionSchema::default().with_comparator(attr),
        &EntityKind::default(),
    )
}

// ── Construction & ordering ─────────────────────────────────────

#[test]
fn new_collection_keeps_input_order() {
    let (col, entities) = fixture();
    assert_eq!(col.len(), 4);
    assert_eq!(col.first(), Some(entities[0].clone()));
    assert_eq!(col.last(), Some(entities[3].clone()));
    assert_eq!(labels(&col), vec!["a", "b", "c", "d"]);
}

#[test]
fn with_entities_is_silent_and_claims_members() {
    let entity = Entity::from_attributes(json!({"id": 1}));
    let log = record(entity.events(), "all");
    let col = EntityCollection::with_entities(&CollectionKind::default(), [entity.clone()], Options::default());

    assert!(log.borrow().is_empty());
    assert_eq!(entity.collection(), Some(col));
}

#[test]
fn sort_with_compare_function() {
    init_tracing();
    let (col, _) = fixture();
    let sorts = count(col.events(), names::SORT);

    col.set_comparator(Some(Comparator::compare(
        |_: &EntityCollection, a: &Entity, b: &Entity| id_of(a).cmp(&id_of(b)),
    )));
    col.sort(Options::default()).unwrap();

    assert_eq!(ids(&col), vec![0, 1, 2, 3]);
    assert_eq!(sorts.get(), 1);

    col.sort(Options::new().with_silent()).unwrap();
    assert_eq!(sorts.get(), 1);
}

#[test]
fn field_comparator_keeps_adds_sorted() {
    let col = EntityCollection::new(&sorted_by("label"));
    for label in ["tom", "alice", "zed", "mike"] {
        col.add(json!({"label": label}), Options::default());
    }
    assert_eq!(labels(&col), vec!["alice", "mike", "tom", "zed"]);
}

#[test]
fn sort_key_comparator_receives_collection() {
    let kind = CollectionKind::default().with_comparator(Comparator::sort_key(
        |col: &EntityCollection, entity: &Entity| {
            // descending by id
            json!(col.len() as i64 * 10 - id_of(entity))
        },
    ));
    let col = EntityCollection::with_entities(
        &kind,
        [json!({"id": 1}), json!({"id": 3}), json!({"id": 2})],
        Options::default(),
    );
    assert_eq!(ids(&col), vec![3, 2, 1]);
}

#[test]
fn missing_attribute_sorts_first() {
    let col = EntityCollection::new(&sorted_by("rank"));
    col.add_many(
        [json!({"id": 1, "rank": 2}), json!({"id": 2}), json!({"id": 3, "rank": 1})],
        Options::default(),
    );
    assert_eq!(ids(&col), vec![2, 3, 1]);
}

#[test]
fn sort_without_comparator_fails() {
    let (col, _) = fixture();
    assert!(matches!(col.sort(Options::default()), Err(Error::NoComparator)));
}

#[test]
fn clearing_comparator_stops_auto_sort() {
    let col = EntityCollection::new(&sorted_by("id"));
    col.set_comparator(None);
    col.add_many([json!({"id": 2}), json!({"id": 1})], Options::default());
    assert_eq!(ids(&col), vec![2, 1]);
}

// ── Lookup ──────────────────────────────────────────────────────

#[test]
fn get_by_id_client_id_entity_and_bag() {
    let (col, entities) = fixture();
    let c = &entities[2];

    assert_eq!(col.get(1), Some(c.clone()));
    assert_eq!(col.get("1"), Some(c.clone()));
    assert_eq!(col.get(c.client_id()), Some(c.clone()));
    assert_eq!(col.get(c.client_id().to_string()), Some(c.clone()));
    assert_eq!(col.get(c), Some(c.clone()));
    assert_eq!(col.get(attrs(json!({"id": 1}))), Some(c.clone()));
    assert_eq!(col.get(json!({"id": 1})), Some(c.clone()));
    assert_eq!(col.get(Value::Null), None);
    assert_eq!(col.get(99), None);
}

#[test]
fn get_by_equal_id_from_other_instance() {
    let (col, entities) = fixture();
    let stranger = Entity::from_attributes(json!({"id": 2}));
    assert_eq!(col.get(&stranger), Some(entities[1].clone()));
    assert!(col.contains(&stranger));
}

#[test]
fn id_change_rekeys_member() {
    let kind = EntityKind::from_schema(EntitySchema::new("mongo").with_id_attribute("_id"));
    let col = EntityCollection::new(&CollectionKind::new(&kind));
    let entity = col.add(json!({"_id": 100}), Options::default()).unwrap();

    assert_eq!(col.get(100), Some(entity.clone()));
    entity.set_attr("_id", json!(101), Options::default());
    assert_eq!(col.get(100), None);
    assert_eq!(col.get(101), Some(entity.clone()));

    entity.unset("_id", Options::default());
    assert_eq!(col.get(101), None);
    assert_eq!(col.get(entity.client_id()), Some(entity));
}

#[test]
fn new_member_gaining_id_is_indexed() {
    let col = EntityCollection::default();
    let entity = col.add(json!({"name": "x"}), Options::default()).unwrap();
    assert_eq!(col.get(5), None);

    entity.set_attr("id", json!(5), Options::default());
    assert_eq!(col.get(5), Some(entity));
}

#[test]
fn at_supports_negative_indexes() {
    let (col, entities) = fixture();
    assert_eq!(col.at(2), Some(entities[2].clone()));
    assert_eq!(col.at(-2), Some(entities[2].clone()));
    assert_eq!(col.at(-5), None);
    assert_eq!(col.at(4), None);
}

#[test]
fn slice_index_of_and_pluck() {
    let (col, entities) = fixture();
    assert_eq!(col.slice(1, 3), vec![entities[1].clone(), entities[2].clone()]);
    assert_eq!(col.slice(3, 10), vec![entities[3].clone()]);
    assert!(col.slice(5, 2).is_empty());
    assert_eq!(col.index_of(&entities[3]), Some(3));
    assert_eq!(col.index_of(&Entity::from_attributes(json!({}))), None);
    assert_eq!(
        col.pluck("label"),
        vec![Some(json!("a")), Some(json!("b")), Some(json!("c")), Some(json!("d"))]
    );
    assert_eq!(col.pluck("missing"), vec![None; 4]);
}

// ── add ─────────────────────────────────────────────────────────

#[test]
fn add_emits_add_with_collection_and_options() {
    let (col, _) = fixture();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let s = Rc::clone(&seen);
    col.events().on(
        names::ADD,
        &Callback::new(move |_: &str, event: &ModelEvent| {
            if let ModelEvent::Added { entity, collection, options } = event {
                s.borrow_mut().push((
                    entity.get("label"),
                    collection.len(),
                    options.extra.get("tag").cloned(),
                ));
            }
        }),
        None,
    );

    let added = col
        .add(json!({"id": 4, "label": "e"}), Options::new().with_extra("tag", json!(1)))
        .unwrap();
    assert_eq!(col.last(), Some(added.clone()));
    assert_eq!(added.collection(), Some(col));
    assert_eq!(*seen.borrow(), vec![(Some(json!("e")), 5, Some(json!(1)))]);
}

#[test]
fn add_at_position() {
    let (col, _) = fixture();
    col.add(json!({"id": 10, "label": "x"}), Options::new().with_at(1));
    assert_eq!(labels(&col), vec!["a", "x", "b", "c", "d"]);

    col.add_many(
        [json!({"label": "y"}), json!({"label": "z"})],
        Options::new().with_at(100),
    );
    assert_eq!(labels(&col), vec!["a", "x", "b", "c", "d", "y", "z"]);
}

#[test]
fn add_at_ignores_comparator() {
    let col = EntityCollection::new(&sorted_by("id"));
    col.add_many([json!({"id": 1}), json!({"id": 2})], Options::default());
    col.add(json!({"id": 0}), Options::new().with_at(2));
    assert_eq!(ids(&col), vec![1, 2, 0]);
}

#[test]
fn add_empty_items_builds_default_entities() {
    let col = EntityCollection::default();
    col.add_many([Item::Empty, Item::Empty], Options::default());
    assert_eq!(col.len(), 2);
    assert!(col.entities().iter().all(|entity| entity.attributes().is_empty()));
}

#[test]
fn add_existing_without_merge_leaves_it_alone() {
    let col = EntityCollection::default();
    let moe = col.add(json!({"id": 1, "name": "Moe"}), Options::default()).unwrap();
    let adds = count(col.events(), names::ADD);

    let returned = col.add(json!({"id": 1, "name": "Moses"}), Options::default());
    assert_eq!(returned, Some(moe.clone()));
    assert_eq!(moe.get("name"), Some(json!("Moe")));
    assert_eq!(adds.get(), 0);

    col.add(json!({"id": 1, "name": "Moses"}), Options::new().with_merge(true));
    assert_eq!(moe.get("name"), Some(json!("Moses")));
    assert_eq!(col.len(), 1);
}

#[test]
fn add_collapses_duplicates_within_one_batch() {
    let col = EntityCollection::default();
    let results = col.add_many(
        [json!({"id": 1, "n": 1}), json!({"id": 1, "n": 2}), json!({"id": 2})],
        Options::default(),
    );
    assert_eq!(col.len(), 2);
    assert_eq!(results[0], results[1]);
    assert_eq!(col.get(1).unwrap().get("n"), Some(json!(1)));
}

#[test]
fn add_same_instance_twice_in_one_batch() {
    let col = EntityCollection::default();
    let entity = Entity::from_attributes(json!({"name": "no id"}));
    col.set([entity.clone(), entity.clone()], Options::default());
    assert_eq!(col.entities(), vec![entity]);
}

#[test]
fn add_with_parse_runs_collection_and_entity_hooks() {
    struct Doubled;
    impl EntityBehavior for Doubled {
        fn parse(&self, response: Value, _: &Options) -> Value {
            let n = response.get("n").and_then(Value::as_i64).unwrap_or(0);
            json!({"id": response.get("id").cloned().unwrap_or(Value::Null), "n": n * 2})
        }
    }
    let kind = CollectionKind::new(&EntityKind::new("doubled").with_behavior(Doubled))
        .with_parse(|response: Value, _: &Options| match response {
            Value::Array(items) => Value::Array(items.into_iter().rev().collect()),
            other => other,
        });
    let col = EntityCollection::new(&kind);

    col.add_many(
        [json!({"id": 1, "n": 1}), json!({"id": 2, "n": 2})],
        Options::new().with_parse(true),
    );
    assert_eq!(ids(&col), vec![2, 1]);
    assert_eq!(col.pluck("n"), vec![Some(json!(4)), Some(json!(2))]);

    col.add(json!({"id": 3, "n": 3}), Options::default());
    assert_eq!(col.get(3).unwrap().get("n"), Some(json!(3)));
}

#[test]
fn entities_built_by_collection_know_it_during_initialize() {
    struct RecordOwner(Rc<Cell<bool>>);
    impl EntityBehavior for RecordOwner {
        fn initialize(&self, entity: &Entity, _: &Options) {
            self.0.set(entity.collection().is_some());
        }
    }
    let owned = Rc::new(Cell::new(false));
    let kind = CollectionKind::new(
        &EntityKind::new("owned").with_behavior(RecordOwner(Rc::clone(&owned))),
    );
    let col = EntityCollection::new(&kind);

    col.add(json!({}), Options::default());
    assert!(owned.get());
}

#[test]
fn invalid_items_are_discarded() {
    let col = EntityCollection::new(&CollectionKind::new(&validated_kind()));
    col.add(json!({"id": 1}), Options::default());
    let errors = Rc::new(RefCell::new(Vec::new()));
    let e = Rc::clone(&errors);
    col.events().on(
        names::INVALID,
        &Callback::new(move |_: &str, event: &ModelEvent| {
            if let ModelEvent::Invalid { target, error, .. } = event {
                e.borrow_mut().push((target.as_collection().is_some(), error.clone()));
            }
        }),
        None,
    );

    let added = col.add(json!({"id": 2, "valid": false}), Options::new().with_validate());
    assert_eq!(added, None);
    assert_eq!(col.len(), 1);
    assert_eq!(*errors.borrow(), vec![(true, json!("invalid"))]);

    let unchecked = col.add(json!({"id": 3, "valid": false}), Options::default());
    assert!(unchecked.is_some());
}

#[test]
fn invalid_entity_instances_are_discarded_when_validating() {
    let col = EntityCollection::new(&CollectionKind::new(&validated_kind()));
    let bad = validated_kind().create(json!({"valid": false}), Options::default());
    assert_eq!(col.add(&bad, Options::new().with_validate()), None);
    assert!(col.is_empty());
}

// ── set ─────────────────────────────────────────────────────────

#[test]
fn set_adds_merges_and_removes() {
    let (col, entities) = fixture();
    let log = record(col.events(), "add remove change");

    col.set(
        [json!({"id": 3, "label": "A"}), json!({"id": 1}), json!({"id": 7, "label": "new"})],
        Options::default(),
    );

    assert_eq!(ids(&col), vec![3, 1, 7]);
    assert_eq!(entities[0].get("label"), Some(json!("A")));
    assert_eq!(entities[1].collection(), None);
    assert_eq!(
        *log.borrow(),
        vec!["change", "remove", "remove", "add"]
    );
}

#[test]
fn set_flags_switch_steps_off() {
    let (col, entities) = fixture();

    col.set(
        [json!({"id": 3, "label": "A"}), json!({"id": 9})],
        Options::new().with_add(false).with_remove(false).with_merge(false),
    );
    assert_eq!(col.len(), 4);
    assert_eq!(entities[0].get("label"), Some(json!("a")));

    col.set([json!({"id": 9})], Options::new().with_remove(false));
    assert_eq!(col.len(), 5);

    col.set([json!({"id": 9})], Options::new().with_add(false));
    assert_eq!(ids(&col), vec![9]);
}

#[test]
fn set_reorders_to_input_and_emits_sort() {
    let (col, _) = fixture();
    let sorts = count(col.events(), names::SORT);

    col.set([json!({"id": 0}), json!({"id": 3}), json!({"id": 2}), json!({"id": 1})], Options::default());
    assert_eq!(ids(&col), vec![0, 3, 2, 1]);
    assert_eq!(sorts.get(), 1);
}

#[test]
fn add_with_sort_false_skips_comparator() {
    let col = EntityCollection::new(&sorted_by("id"));
    let sorts = count(col.events(), names::SORT);
    col.add_many(
        [json!({"id": 2}), json!({"id": 1})],
        Options { sort: Some(false), ..Options::default() },
    );
    assert_eq!(ids(&col), vec![2, 1]);
    assert_eq!(sorts.get(), 0);
}

#[test]
fn set_merge_resorts_when_sort_field_changes() {
    let col = EntityCollection::new(&sorted_by("rank"));
    col.add_many([json!({"id": 1, "rank": 1}), json!({"id": 2, "rank": 2})], Options::default());
    let sorts = count(col.events(), names::SORT);

    col.set([json!({"id": 1, "rank": 3}), json!({"id": 2, "rank": 2})], Options::default());
    assert_eq!(ids(&col), vec![2, 1]);
    assert_eq!(sorts.get(), 1);
}

#[test]
fn merging_add_emits_one_sort() {
    let col = EntityCollection::new(&sorted_by("rank"));
    col.add_many([json!({"id": 1, "rank": 1}), json!({"id": 2, "rank": 2})], Options::default());
    let sorts = count(col.events(), names::SORT);
    let changes = count(col.events(), names::CHANGE);

    col.add(json!({"id": 1, "rank": 3}), Options::new().with_merge(true));
    assert_eq!(ids(&col), vec![2, 1]);
    assert_eq!(changes.get(), 1);
    assert_eq!(sorts.get(), 1);
}

#[test]
fn member_change_after_merge_still_resorts() {
    let col = EntityCollection::new(&sorted_by("rank"));
    col.add_many([json!({"id": 1, "rank": 1}), json!({"id": 2, "rank": 2})], Options::default());
    col.add(json!({"id": 1, "rank": 3}), Options::new().with_merge(true));
    let sorts = count(col.events(), names::SORT);

    col.get(1).unwrap().set_attr("rank", json!(0), Options::default());
    assert_eq!(ids(&col), vec![1, 2]);
    assert_eq!(sorts.get(), 1);
}

#[test]
fn silent_set_emits_nothing() {
    let (col, _) = fixture();
    let events = count(col.events(), "all");
    col.set([json!({"id": 8})], Options::new().with_silent());
    assert_eq!(ids(&col), vec![8]);
    assert_eq!(events.get(), 0);
}

// ── remove ──────────────────────────────────────────────────────

#[test]
fn remove_reports_former_index() {
    let (col, entities) = fixture();
    let index = Rc::new(Cell::new(None));
    let i = Rc::clone(&index);
    col.events().on(
        names::REMOVE,
        &Callback::new(move |_: &str, event: &ModelEvent| {
            i.set(event.options().and_then(|options| options.index));
        }),
        None,
    );

    let removed = col.remove(&entities[3], Options::default());
    assert_eq!(removed, Some(entities[3].clone()));
    assert_eq!(index.get(), Some(3));
    assert_eq!(labels(&col), vec!["a", "b", "c"]);
    assert_eq!(col.get(0), None);
}

#[test]
fn remove_by_id_and_missing() {
    let (col, entities) = fixture();
    assert_eq!(col.remove(2, Options::default()), Some(entities[1].clone()));
    assert_eq!(col.remove(2, Options::default()), None);
    assert_eq!(
        col.remove_many([Item::from(json!({"id": 3})), Item::from(json!({"id": 42}))], Options::default()),
        vec![Some(entities[0].clone()), None]
    );
    assert_eq!(col.len(), 2);
}

#[test]
fn removed_entity_stops_bubbling() {
    let (col, entities) = fixture();
    let changes = count(col.events(), names::CHANGE);

    entities[0].set_attr("label", json!("x"), Options::default());
    assert_eq!(changes.get(), 1);

    col.remove(&entities[0], Options::default());
    assert_eq!(entities[0].collection(), None);
    entities[0].set_attr("label", json!("y"), Options::default());
    assert_eq!(changes.get(), 1);
}

#[test]
fn silent_remove_emits_nothing() {
    let (col, entities) = fixture();
    let removes = count(entities[0].events(), names::REMOVE);
    col.remove(&entities[0], Options::new().with_silent());
    assert_eq!(removes.get(), 0);
    assert_eq!(col.len(), 3);
}

#[test]
fn destroyed_member_leaves_collection() {
    let (col, _) = fixture();
    let fresh = col.add(json!({"label": "new"}), Options::default()).unwrap();
    let removes = count(col.events(), names::REMOVE);

    assert!(!fresh.destroy(Options::default()).unwrap());
    assert_eq!(col.len(), 4);
    assert_eq!(removes.get(), 1);
    assert!(!col.contains(&fresh));
}

// ── Several collections ─────────────────────────────────────────

#[test]
fn entity_in_two_collections() {
    let entity = Entity::from_attributes(json!({"id": 5}));
    let first = EntityCollection::default();
    let second = EntityCollection::default();
    let first_adds = count(first.events(), names::ADD);
    let first_removes = count(first.events(), names::REMOVE);
    let second_changes = count(second.events(), names::CHANGE);

    first.add(&entity, Options::default());
    second.add(&entity, Options::default());
    assert_eq!(entity.collection(), Some(first.clone()));
    assert_eq!(first_adds.get(), 1);

    second.remove(&entity, Options::default());
    assert_eq!(first_removes.get(), 0);
    assert_eq!(entity.collection(), Some(first.clone()));

    second.add(&entity, Options::default());
    first.remove(&entity, Options::default());
    assert_eq!(entity.collection(), None);

    entity.set_attr("x", json!(1), Options::default());
    assert_eq!(second_changes.get(), 1);
}

// ── reset ───────────────────────────────────────────────────────

#[test]
fn reset_replaces_contents_with_one_event() {
    let (col, entities) = fixture();
    let log = record(col.events(), "all");
    let previous = Rc::new(RefCell::new(Vec::new()));
    let p = Rc::clone(&previous);
    col.events().on(
        names::RESET,
        &Callback::new(move |_: &str, event: &ModelEvent| {
            if let Some(options) = event.options() {
                *p.borrow_mut() = options.previous_entities.clone();
            }
        }),
        None,
    );

    col.reset([json!({"id": 10}), json!({"id": 11})], Options::default());
    assert_eq!(ids(&col), vec![10, 11]);
    assert_eq!(*log.borrow(), vec!["reset"]);
    assert_eq!(*previous.borrow(), entities);
    assert!(entities.iter().all(|entity| entity.collection().is_none()));

    col.reset(Vec::<Item>::new(), Options::default());
    assert!(col.is_empty());
    assert_eq!(col.get(10), None);
}

#[test]
fn reset_with_same_members_keeps_them() {
    let (col, entities) = fixture();
    col.reset(entities.clone(), Options::default());
    assert_eq!(col.entities(), entities);
    assert!(entities.iter().all(|entity| entity.collection() == Some(col.clone())));
}

#[test]
fn silent_reset_emits_nothing() {
    let (col, _) = fixture();
    let resets = count(col.events(), names::RESET);
    col.reset([json!({"id": 1})], Options::new().with_silent());
    assert_eq!(resets.get(), 0);
    assert_eq!(col.len(), 1);
}

// ── Change-driven ordering ──────────────────────────────────────

#[test]
fn member_change_resorts_by_field() {
    let col = EntityCollection::new(&sorted_by("x"));
    col.add_many([json!({"id": 1, "x": 1}), json!({"id": 2, "x": 2})], Options::default());
    let sorts = count(col.events(), names::SORT);

    col.get(1).unwrap().set_attr("x", json!(3), Options::default());
    assert_eq!(ids(&col), vec![2, 1]);
    assert_eq!(sorts.get(), 1);

    col.get(1).unwrap().set_attr("other", json!(true), Options::default());
    assert_eq!(sorts.get(), 1);
}

#[test]
fn member_change_without_reorder_emits_no_sort() {
    let col = EntityCollection::new(&sorted_by("x"));
    col.add_many([json!({"id": 1, "x": 1}), json!({"id": 2, "x": 5})], Options::default());
    let sorts = count(col.events(), names::SORT);

    col.get(1).unwrap().set_attr("x", json!(2), Options::default());
    assert_eq!(ids(&col), vec![1, 2]);
    assert_eq!(sorts.get(), 0);
}

#[test]
fn resort_on_change_can_be_disabled() {
    let kind = sorted_by("x").with_resort_on_change(false);
    let col = EntityCollection::new(&kind);
    col.add_many([json!({"id": 1, "x": 1}), json!({"id": 2, "x": 2})], Options::default());

    col.get(1).unwrap().set_attr("x", json!(3), Options::default());
    assert_eq!(ids(&col), vec![1, 2]);
}

#[test]
fn member_events_bubble_with_their_names() {
    let (col, entities) = fixture();
    let log = record(col.events(), "all");
    entities[2].set_attr("label", json!("C"), Options::default());
    entities[2].events().trigger("custom", &ModelEvent::Custom(json!(1)));
    assert_eq!(*log.borrow(), vec!["change:label", "change", "custom"]);
}

// ── Convenience ─────────────────────────────────────────────────

#[test]
fn push_pop_shift_unshift() {
    let col = EntityCollection::new(&sorted_by("id"));
    col.add_many([json!({"id": 2}), json!({"id": 3})], Options::default());

    col.push(json!({"id": 1}), Options::default());
    col.unshift(json!({"id": 4}), Options::default());
    assert_eq!(ids(&col), vec![4, 2, 3, 1]);

    assert_eq!(col.pop(Options::default()).map(|e| id_of(&e)), Some(1));
    assert_eq!(col.shift(Options::default()).map(|e| id_of(&e)), Some(4));
    assert_eq!(ids(&col), vec![2, 3]);

    let empty = EntityCollection::default();
    assert_eq!(empty.pop(Options::default()), None);
    assert_eq!(empty.shift(Options::default()), None);
}

#[test]
fn where_matches_and_find_where() {
    let col = EntityCollection::default();
    col.add_many(
        [
            json!({"a": 1}),
            json!({"a": 1}),
            json!({"a": 1, "b": 2}),
            json!({"a": 2, "b": 2}),
            json!({"a": 3}),
        ],
        Options::default(),
    );

    assert_eq!(col.where_matches(json!({"a": 1})).len(), 3);
    assert_eq!(col.where_matches(json!({"a": 2})).len(), 1);
    assert_eq!(col.where_matches(json!({"a": 1, "b": 2})).len(), 1);
    assert!(col.where_matches(json!({})).is_empty());
    assert_eq!(
        col.find_where(json!({"b": 2})).and_then(|e| e.get("a")),
        Some(json!(1))
    );
    assert_eq!(col.find_where(json!({})), None);
}

#[test]
fn group_index_and_sort_by_attribute() {
    let col = EntityCollection::default();
    col.add_many(
        [
            json!({"id": 1, "kind": "odd", "rank": 3}),
            json!({"id": 2, "kind": "even", "rank": 1}),
            json!({"id": 3, "kind": "odd", "rank": 2}),
            json!({"id": 4}),
        ],
        Options::default(),
    );

    let groups = col.group_by("kind");
    let sizes: Vec<(String, usize)> = groups.iter().map(|(k, v)| (k.clone(), v.len())).collect();
    assert_eq!(
        sizes,
        vec![("even".to_owned(), 1), ("null".to_owned(), 1), ("odd".to_owned(), 2)]
    );

    let by_id = col.index_by("id");
    assert_eq!(by_id.get("3").map(id_of), Some(3));

    let sorted: Vec<i64> = col.sort_by_attr("rank").iter().map(id_of).collect();
    assert_eq!(sorted, vec![4, 2, 3, 1]);
    assert_eq!(ids(&col), vec![1, 2, 3, 4]);
}

#[test]
fn iteration_helpers_run_over_snapshot() {
    let (col, _) = fixture();
    let removing = col.clone();
    let visited = col.map(|entity| {
        removing.remove(entity, Options::default());
        id_of(entity)
    });
    assert_eq!(visited, vec![3, 2, 1, 0]);
    assert!(col.is_empty());
}

#[test]
fn filter_find_any() {
    let (col, _) = fixture();
    assert_eq!(col.filter(|e| id_of(e) % 2 == 0).len(), 2);
    assert_eq!(col.find(|e| id_of(e) < 2).map(|e| id_of(&e)), Some(1));
    assert!(col.any(|e| id_of(e) == 0));
    assert!(!col.any(|e| id_of(e) == 9));
}

#[test]
fn duplicate_shares_members_and_comparator() {
    let col = EntityCollection::new(&sorted_by("id"));
    col.add_many([json!({"id": 2}), json!({"id": 1})], Options::default());
    col.set_comparator(Some(Comparator::field("label")));

    let copy = col.duplicate();
    assert_eq!(copy.entities(), col.entities());
    assert!(matches!(copy.comparator(), Some(Comparator::Field(attr)) if attr == "label"));
    assert_eq!(copy.get(1).unwrap().collection(), Some(col.clone()));

    copy.remove(1, Options::default());
    assert_eq!(col.len(), 2);
}

#[test]
fn to_json_and_serialize() {
    let (col, _) = fixture();
    let expected = json!([
        {"id": 3, "label": "a"},
        {"id": 2, "label": "b"},
        {"id": 1, "label": "c"},
        {"id": 0, "label": "d"}
    ]);
    assert_eq!(col.to_json(), expected);
    assert_eq!(serde_json::to_value(&col).unwrap(), expected);
}

#[test]
fn client_id_strings_round_trip_through_get() {
    let col = EntityCollection::default();
    let entity = col.add(json!({}), Options::default()).unwrap();
    let text = entity.client_id().to_string();
    assert_eq!(ClientId::parse(&text), Some(entity.client_id()));
    assert_eq!(col.get(text), Some(entity));
}
