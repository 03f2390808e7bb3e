//! Indexes never change query results.

use digitool_core::{Collection, Fields, Store};
use proptest::prelude::*;
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::sync::Arc;

#[derive(Debug, Clone)]
enum Op {
    Insert(Option<Value>),
    Set { matching: Value, to: Value },
    Unset { matching: Value },
    Delete(Value),
}

fn value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        Just(json!(true)),
        (0i64..3).prop_map(|n| json!(n)),
        Just(json!(1.0)),
        Just(json!(1.5)),
        prop::sample::select(vec!["a", "b"]).prop_map(|s| json!(s)),
        Just(json!([1, 2])),
    ]
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => prop::option::of(value_strategy()).prop_map(Op::Insert),
        2 => (value_strategy(), value_strategy()).prop_map(|(matching, to)| Op::Set { matching, to }),
        1 => value_strategy().prop_map(|matching| Op::Unset { matching }),
        1 => value_strategy().prop_map(Op::Delete),
    ]
}

fn apply(collection: &Collection, op: &Op, next_id: usize) {
    match op {
        Op::Insert(value) => {
            let mut fields = Fields::new();
            fields.insert("_id".into(), json!(format!("d{next_id}")));
            if let Some(value) = value {
                fields.insert("k".into(), value.clone());
            }
            collection.insert(fields).unwrap();
        }
        Op::Set { matching, to } => {
            collection
                .update(&json!({ "k": matching }), &json!({"$set": { "k": to }}))
                .unwrap();
        }
        Op::Unset { matching } => {
            // Replacing drops the field entirely.
            collection
                .update(&json!({ "k": matching }), &json!({"other": 1}))
                .unwrap();
        }
        Op::Delete(matching) => {
            collection.delete(&json!({ "k": matching })).unwrap();
        }
    }
}

fn found_ids(collection: &Collection, query: &Value) -> BTreeSet<String> {
    collection
        .find(query)
        .unwrap()
        .iter()
        .map(|doc| doc.id().as_str().to_string())
        .collect()
}

fn probes() -> Vec<Value> {
    vec![
        Value::Null,
        json!(true),
        json!(0),
        json!(1),
        json!(2),
        json!(1.0),
        json!(1.5),
        json!("a"),
        json!("b"),
        json!([1, 2]),
        json!([2, 1]),
    ]
}

fn collections() -> (Store, Arc<Collection>, Arc<Collection>) {
    let store = Store::open_in_memory();
    let db = store.database("prop").unwrap();
    let plain = db.collection("plain").unwrap();
    let indexed = db.collection("indexed").unwrap();
    indexed.create_index("k").unwrap();
    (store, plain, indexed)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn index_does_not_change_results(ops in prop::collection::vec(op_strategy(), 1..40)) {
        let (_store, plain, indexed) = collections();
        for (n, op) in ops.iter().enumerate() {
            apply(&plain, op, n);
            apply(&indexed, op, n);
        }

        for probe in probes() {
            let query = json!({ "k": probe });
            prop_assert_eq!(
                found_ids(&plain, &query),
                found_ids(&indexed, &query),
                "query {}", query
            );
        }
    }

    #[test]
    fn late_index_matches_maintained_index(ops in prop::collection::vec(op_strategy(), 1..40)) {
        let (_store, late, maintained) = collections();
        for (n, op) in ops.iter().enumerate() {
            apply(&late, op, n);
            apply(&maintained, op, n);
        }
        late.create_index("k").unwrap();
        maintained.rebuild_indexes().unwrap();

        for probe in probes() {
            let query = json!({ "k": probe });
            prop_assert_eq!(found_ids(&late, &query), found_ids(&maintained, &query));
        }
    }
}
