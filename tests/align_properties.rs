//! Property-based tests for the feature-alignment contract
//!
//! The alignment invariants: the output vector always matches the schema
//! length, every entry is finite, and alignment is a pure function of
//! (payload, mode).

use proptest::prelude::*;
use serde_json::{json, Map, Value};

use prever::align::{align, FeatureMode};
use prever::schema::FeatureSchema;

fn payload_from(value: Value) -> Map<String, Value> {
    value.as_object().expect("object payload").clone()
}

fn aliased_mode() -> FeatureMode {
    FeatureMode::Aliased(FeatureSchema::new(vec![
        "listing.usableAreas".to_string(),
        "listing.bedrooms".to_string(),
        "listing.bathrooms".to_string(),
        "listing.parkingSpaces".to_string(),
        "listing.address.city_Santos".to_string(),
        "listing.address.city_São Paulo".to_string(),
        "imvl_type_casas".to_string(),
        "imvl_type_casas-de-condominio".to_string(),
    ]))
}

// ============================================================================
// Fixed-point checks from the serving contract
// ============================================================================

#[test]
fn test_legacy_contract() {
    let result = align(
        &payload_from(json!({"area": 120, "quartos": 3})),
        &FeatureMode::Legacy,
    )
    .expect("align");
    assert_eq!(result.vector, vec![120.0, 3.0]);
}

#[test]
fn test_alias_contract() {
    let mode = FeatureMode::Aliased(FeatureSchema::new(vec![
        "listing.usableAreas".to_string(),
        "listing.bedrooms".to_string(),
        "listing.bathrooms".to_string(),
        "listing.parkingSpaces".to_string(),
    ]));
    let result = align(
        &payload_from(json!({"area": 70, "quartos": 2, "bathrooms": 1, "parkingSpaces": 1})),
        &mode,
    )
    .expect("align");
    assert_eq!(result.vector, vec![70.0, 2.0, 1.0, 1.0]);
}

#[test]
fn test_unknown_category_changes_nothing() {
    let mode = aliased_mode();
    let with = align(
        &payload_from(json!({"area": 70, "city": "Atlantis"})),
        &mode,
    )
    .expect("align");
    let without = align(&payload_from(json!({"area": 70})), &mode).expect("align");
    assert_eq!(with.vector, without.vector);
    assert_eq!(with.caveats.len(), 1);
}

// ============================================================================
// Property invariants
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_vector_length_and_finiteness(
        area in -1e6f64..1e6,
        quartos in 0i64..20,
        banheiros in 0i64..10,
        vagas in 0i64..10,
        city in prop::sample::select(vec!["Santos", "São Paulo", "Atlantis", "Campinas"]),
        imvl_type in prop::sample::select(vec!["casas", "apartamentos", "sobrados"]),
    ) {
        let mode = aliased_mode();
        let payload = payload_from(json!({
            "area": area,
            "quartos": quartos,
            "banheiros": banheiros,
            "vagas": vagas,
            "city": city,
            "imvl_type": imvl_type,
        }));

        let result = align(&payload, &mode).expect("align");
        prop_assert_eq!(result.vector.len(), mode.n_features());
        prop_assert!(result.vector.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn prop_align_is_idempotent(
        area in 0f64..1e4,
        quartos in 0i64..10,
        city in prop::sample::select(vec!["Santos", "Atlantis"]),
    ) {
        let mode = aliased_mode();
        let payload = payload_from(json!({"area": area, "quartos": quartos, "city": city}));

        let first = align(&payload, &mode).expect("align");
        let second = align(&payload, &mode).expect("align");
        prop_assert_eq!(first, second);
    }

    #[test]
    fn prop_legacy_vector_is_always_two_wide(
        area in prop::option::of(-1e5f64..1e5),
        quartos in prop::option::of(0i64..50),
    ) {
        let mut map = Map::new();
        if let Some(a) = area {
            map.insert("area".to_string(), json!(a));
        }
        if let Some(q) = quartos {
            map.insert("quartos".to_string(), json!(q));
        }

        let result = align(&map, &FeatureMode::Legacy).expect("align");
        prop_assert_eq!(result.vector.len(), 2);
        prop_assert!(result.vector.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn prop_extra_fields_never_change_the_vector(
        area in 0f64..1e4,
        junk_key in "[a-z]{4,12}",
        junk_value in "[a-zA-Z0-9 ]{0,20}",
    ) {
        // Field names colliding with the recognized set are not "extra".
        prop_assume!(!matches!(
            junk_key.as_str(),
            "area" | "quartos" | "bedrooms" | "bathrooms" | "banheiros"
                | "parkingSpaces" | "vagas" | "city" | "imvl_type"
        ));

        let mode = aliased_mode();
        let base = payload_from(json!({"area": area}));
        let mut extended = base.clone();
        extended.insert(junk_key, json!(junk_value));

        let plain = align(&base, &mode).expect("align");
        let with_junk = align(&extended, &mode).expect("align");
        prop_assert_eq!(plain.vector, with_junk.vector);
    }
}

// ============================================================================
// Strict-mode collect-all policy
// ============================================================================

#[test]
fn test_strict_reports_every_problem_at_once() {
    let mode = FeatureMode::Strict(FeatureSchema::new(vec![
        "a".to_string(),
        "b".to_string(),
        "c".to_string(),
    ]));
    let err = align(
        &payload_from(json!({"a": "notanumber", "c": 1})),
        &mode,
    )
    .expect_err("must fail");

    let prever::PreverError::Validation(errors) = err else {
        panic!("expected validation error");
    };
    let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
    assert_eq!(fields, vec!["a", "b"]);
}
