//! Resolution behavior across the layered matching strategies.

use std::collections::BTreeMap;

use studybridge::catalog::{ColumnDescriptor, TableDescriptor};
use studybridge::resolver::{ColumnResolver, LiveColumn, MatchKind, FUZZY_LOOKUP_THRESHOLD};

fn descriptor(columns: &[(&str, &str)], aliases: &[(&str, &str)]) -> TableDescriptor {
    TableDescriptor {
        name: "autoquestionnaire".to_string(),
        description: String::new(),
        schema: "_prod_thesaurus_face_bp".to_string(),
        columns: columns
            .iter()
            .map(|(name, data_type)| ColumnDescriptor {
                name: name.to_string(),
                data_type: data_type.to_string(),
                description: None,
            })
            .collect(),
        aliases: aliases
            .iter()
            .map(|(a, e)| (a.to_string(), e.to_string()))
            .collect::<BTreeMap<_, _>>(),
    }
}

fn live(names: &[&str]) -> Vec<LiveColumn> {
    names.iter().map(|n| LiveColumn::new(*n, "text")).collect()
}

#[test]
fn case_insensitive_exact_match_has_full_confidence() {
    let table = descriptor(&[], &[]);
    let resolver = ColumnResolver::new(&table);
    let live = live(&["patient_id", "visit_date"]);

    let m = resolver
        .find_matching_column("PATIENT_ID", &live)
        .expect("case difference alone must not block resolution");
    assert_eq!(m.db_name, "patient_id");
    assert_eq!(m.confidence, 1.0);
    assert_eq!(m.kind, MatchKind::Exact);
}

#[test]
fn subject_id_resolves_past_the_similarity_threshold() {
    let table = descriptor(&[], &[]);
    let resolver = ColumnResolver::new(&table);
    // A suffix long enough that plain similarity would stay below 0.6
    let live = live(&["center_code", "usubjid_recoded_2021_final"]);

    let m = resolver
        .find_matching_column("usubjid", &live)
        .expect("subject identifiers must survive naming drift");
    assert_eq!(m.db_name, "usubjid_recoded_2021_final");
}

#[test]
fn name_without_candidates_is_unresolved_not_an_error() {
    let table = descriptor(&[], &[]);
    let resolver = ColumnResolver::new(&table);
    let live = live(&["alpha", "beta", "gamma"]);

    let requested = vec!["qqqqqqqqqqqq".to_string()];
    let resolution = resolver.resolve(&live, &requested);
    assert!(resolution.resolved.is_empty());
    assert_eq!(resolution.unresolved, requested);
}

#[test]
fn fuzzy_match_requires_score_above_threshold() {
    let table = descriptor(&[], &[]);
    let resolver = ColumnResolver::new(&table);
    let live = live(&["questionnaire_score"]);

    // Misspelled but near-identical name: accepted
    let hit = resolver.find_matching_column("questionaire_score", &live);
    assert!(hit.is_some());
    let hit = hit.unwrap();
    assert_eq!(hit.kind, MatchKind::Fuzzy);
    assert!(hit.confidence > FUZZY_LOOKUP_THRESHOLD);

    // Distant name: rejected
    assert!(resolver.find_matching_column("zzz", &live).is_none());
}

#[test]
fn alias_table_bridges_catalog_names_to_live_names() {
    // The catalog calls it `poids`; the SQL template exported
    // `weight_kg AS poids`; the live table kept `poids`.
    let table = descriptor(&[("poids", "integer")], &[("poids", "weight_kg")]);
    let resolver = ColumnResolver::new(&table);

    let mapping = resolver.catalog_mapping();
    let entry = mapping.get("poids").expect("catalog column is mapped");
    assert_eq!(entry.kind, MatchKind::Exact);

    let live = live(&["poids", "usubjid"]);
    let m = resolver.find_matching_column("POIDS", &live).unwrap();
    assert_eq!(m.db_name, "poids");
}

#[test]
fn repeated_resolution_is_identical() {
    let table = descriptor(&[("age", "integer")], &[]);
    let resolver = ColumnResolver::new(&table);
    let live = live(&["usubjid_v2", "age", "sex"]);
    let requested: Vec<String> = ["usubjid", "age", "sexe", "unknown_thing"]
        .iter()
        .map(|s| s.to_string())
        .collect();

    let first = resolver.resolve(&live, &requested);
    for _ in 0..5 {
        let again = resolver.resolve(&live, &requested);
        assert_eq!(again.resolved, first.resolved);
        assert_eq!(again.unresolved, first.unresolved);
    }
}
