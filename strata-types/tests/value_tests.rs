use std::cmp::Ordering;

use serde_json::json;
use strata_types::{Error, compare_values, id_key, is_present};

// ── is_present ───────────────────────────────────────────────────

#[test]
fn absent_and_null_are_not_present() {
    assert!(!is_present(None));
    assert!(!is_present(Some(&json!(null))));
}

#[test]
fn falsy_values_are_present() {
    assert!(is_present(Some(&json!(0))));
    assert!(is_present(Some(&json!(false))));
    assert!(is_present(Some(&json!(""))));
}

// ── id_key ───────────────────────────────────────────────────────

#[test]
fn null_id_has_no_key() {
    assert_eq!(id_key(&json!(null)), None);
}

#[test]
fn numeric_and_string_ids_share_keys() {
    assert_eq!(id_key(&json!(1)), id_key(&json!("1")));
    assert_eq!(id_key(&json!("abc")).as_deref(), Some("abc"));
}

#[test]
fn zero_is_a_valid_id_key() {
    assert_eq!(id_key(&json!(0)).as_deref(), Some("0"));
}

// ── compare_values ───────────────────────────────────────────────

#[test]
fn numbers_compare_numerically() {
    assert_eq!(compare_values(&json!(2), &json!(10)), Ordering::Less);
    assert_eq!(compare_values(&json!(1.5), &json!(1)), Ordering::Greater);
    assert_eq!(compare_values(&json!(-3), &json!(-3)), Ordering::Equal);
}

#[test]
fn strings_compare_lexically() {
    assert_eq!(compare_values(&json!("a"), &json!("b")), Ordering::Less);
    assert_eq!(compare_values(&json!("10"), &json!("2")), Ordering::Less);
}

#[test]
fn arrays_compare_element_wise() {
    assert_eq!(compare_values(&json!([1, 2]), &json!([1, 3])), Ordering::Less);
    assert_eq!(compare_values(&json!([1, 2]), &json!([1])), Ordering::Greater);
}

#[test]
fn mixed_types_order_by_type() {
    assert_eq!(compare_values(&json!(null), &json!(false)), Ordering::Less);
    assert_eq!(compare_values(&json!(true), &json!(0)), Ordering::Less);
    assert_eq!(compare_values(&json!(99), &json!("a")), Ordering::Less);
    assert_eq!(compare_values(&json!("z"), &json!([])), Ordering::Less);
}

#[test]
fn objects_compare_equal() {
    assert_eq!(compare_values(&json!({"a": 1}), &json!({"b": 2})), Ordering::Equal);
}

// ── Error ────────────────────────────────────────────────────────

#[test]
fn error_messages() {
    assert_eq!(Error::MissingUrl.to_string(), "a url or url root must be specified");
    assert_eq!(Error::NoComparator.to_string(), "collection has no comparator");
    assert_eq!(
        Error::UnresolvedHandler("save".into()).to_string(),
        "event handler `save` is not callable"
    );
    assert!(Error::MissingBackend("note".into()).to_string().contains("note"));
}

#[test]
fn serde_errors_convert() {
    let err: Error = serde_json::from_str::<serde_json::Value>("{").unwrap_err().into();
    assert!(matches!(err, Error::Serialization(_)));
}

// =============================================================================
// ORDERING PROPERTIES
// =============================================================================

mod ordering_properties {
    use super::*;
    use proptest::prelude::*;
    use serde_json::Value;

    fn scalar() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            (-100i64..100).prop_map(|n| json!(n)),
            (-100.0f64..100.0).prop_map(|n| json!(n)),
            "[a-c]{0,3}".prop_map(Value::String),
        ]
    }

    proptest! {
        #[test]
        fn comparison_is_antisymmetric(a in scalar(), b in scalar()) {
            prop_assert_eq!(compare_values(&a, &b), compare_values(&b, &a).reverse());
        }

        #[test]
        fn comparison_is_transitive(a in scalar(), b in scalar(), c in scalar()) {
            if compare_values(&a, &b).is_le() && compare_values(&b, &c).is_le() {
                prop_assert!(compare_values(&a, &c).is_le());
            }
        }

        #[test]
        fn sorting_by_comparison_is_idempotent(mut values in prop::collection::vec(scalar(), 0..12)) {
            values.sort_by(compare_values);
            let once = values.clone();
            values.sort_by(compare_values);
            prop_assert_eq!(values, once);
        }
    }
}
