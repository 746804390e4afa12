use chrono::NaiveDate;
use regex::Regex;

use tbase_core::{Catalog, CatalogColumn, CatalogTable, KeyValue, SearchCriteria};
use tbase_plan::{
    build_query, check_plan_against_catalog, key_column_is_text, parse_table_spec,
    parse_table_specs, validate_plan, IssueKind, PlanOptions, Predicate, TableSpec,
};

const KEY: &str = "PatientID";

fn spec(text: &str, is_anchor: bool) -> TableSpec {
    let mut spec = parse_table_spec(text, KEY).expect("parse spec");
    spec.is_anchor = is_anchor;
    spec
}

fn placeholder_count(text: &str) -> usize {
    let re = Regex::new(r"\$\d+").expect("placeholder regex");
    re.find_iter(text).count()
}

#[test]
fn rejects_duplicate_aliases() {
    let specs = vec![spec("dbo.Patient:p", true), spec("dbo.Diagnose:p", false)];
    let err = validate_plan(specs, &PlanOptions::default()).unwrap_err();
    assert!(err.has(IssueKind::DuplicateAlias));
    assert_eq!(err.issues[0].path, "/tables/1/alias");
}

#[test]
fn rejects_empty_plan() {
    let err = validate_plan(Vec::new(), &PlanOptions::default()).unwrap_err();
    assert!(err.has(IssueKind::EmptyPlan));
}

#[test]
fn rejects_injected_identifier() {
    let mut anchor = spec("dbo.Patient:p", true);
    anchor.table = "Patient; DROP TABLE x".to_string();
    let err = validate_plan(vec![anchor], &PlanOptions::default()).unwrap_err();
    assert!(err.has(IssueKind::InvalidIdentifier));
    assert!(err.to_string().contains("/tables/0/table"));
}

#[test]
fn rejects_two_anchors() {
    let specs = vec![spec("dbo.Patient:p", true), spec("dbo.Diagnose:d", true)];
    let err = validate_plan(specs, &PlanOptions::default()).unwrap_err();
    assert!(err.has(IssueKind::MultipleAnchors));
}

#[test]
fn rejects_missing_anchor() {
    let specs = vec![spec("dbo.Patient:p", false)];
    let err = validate_plan(specs, &PlanOptions::default()).unwrap_err();
    assert!(err.has(IssueKind::MissingAnchor));
}

#[test]
fn reports_every_issue_in_one_pass() {
    let mut specs = vec![spec("dbo.Patient:p", true), spec("dbo.Diagnose:p", false)];
    specs[1].columns.push("ICD10 --".to_string());
    let options = PlanOptions {
        order_by: vec!["x.Datum".parse().expect("order by")],
        limit: Some(0),
        ..PlanOptions::default()
    };
    let err = validate_plan(specs, &options).unwrap_err();
    for kind in [
        IssueKind::DuplicateAlias,
        IssueKind::InvalidIdentifier,
        IssueKind::UnknownOrderAlias,
        IssueKind::InvalidLimit,
    ] {
        assert!(err.has(kind), "missing {kind:?}");
    }
}

#[test]
fn anchor_is_moved_first() {
    let specs = vec![spec("dbo.Diagnose:d", false), spec("dbo.Patient:p", true)];
    let plan = validate_plan(specs, &PlanOptions::default()).expect("valid plan");
    assert_eq!(plan.tables[0].alias, "p");
    assert_eq!(plan.key_column(), Some(KEY));
}

#[test]
fn placeholders_match_parameters() {
    let specs = parse_table_specs(
        ["dbo.Patient:p", "dbo.Diagnose:d[ICD10]", "lab.Befund:b@PatID"],
        KEY,
    )
    .expect("parse specs");
    let plan = validate_plan(specs, &PlanOptions::default()).expect("valid plan");
    let dob = NaiveDate::from_ymd_opt(1961, 11, 3).expect("date");

    let predicates = vec![
        Predicate::All,
        Predicate::from(&SearchCriteria::exact_key(KeyValue::Integer(7))),
        Predicate::from(&SearchCriteria::demographic("Anna", "Berg", dob, 0.8).expect("criteria")),
        Predicate::date_of_birth(dob),
    ];
    let expected = [0, 1, 3, 1];

    for (predicate, expected) in predicates.into_iter().zip(expected) {
        let statement = build_query(&plan.with_criteria(predicate)).expect("build");
        assert_eq!(statement.parameters.len(), expected);
        assert_eq!(placeholder_count(&statement.text), statement.parameters.len());
    }
}

#[test]
fn criteria_values_never_reach_statement_text() {
    let specs = parse_table_specs(["dbo.Patient:p"], KEY).expect("parse specs");
    let plan = validate_plan(specs, &PlanOptions::default()).expect("valid plan");
    let hostile = "x' OR '1'='1";
    let statement = build_query(
        &plan.with_criteria(Predicate::KeyEquals(KeyValue::Text(hostile.to_string()))),
    )
    .expect("build");
    assert!(!statement.text.contains(hostile));
    assert_eq!(statement.parameters.len(), 1);
}

fn patient_catalog(key_type: &str) -> Catalog {
    let column = |name: &str, position: i32, data_type: &str| CatalogColumn {
        ordinal_position: position,
        name: name.to_string(),
        data_type: data_type.to_string(),
        is_nullable: true,
        default: None,
    };
    Catalog::new([CatalogTable {
        schema: "dbo".to_string(),
        name: "Patient".to_string(),
        columns: vec![
            column("PatientID", 1, key_type),
            column("Vorname", 2, "text"),
            column("Name", 3, "text"),
            column("Geburtsdatum", 4, "date"),
        ],
    }])
}

#[test]
fn character_key_columns_switch_to_text_keys() {
    let specs = parse_table_specs(["dbo.Patient:p"], KEY).expect("parse specs");
    let plan = validate_plan(specs, &PlanOptions::default()).expect("valid plan");
    assert!(key_column_is_text(&plan, &patient_catalog("character varying")));
    assert!(!key_column_is_text(&plan, &patient_catalog("integer")));

    let statement = build_query(
        &plan
            .with_text_keys(true)
            .with_criteria(Predicate::KeyEquals(KeyValue::Integer(7))),
    )
    .expect("build");
    assert!(statement.text.contains("\"p\".\"PatientID\"::text = $1"));
}

#[test]
fn catalog_check_reports_unknown_tables_and_columns() {
    let catalog = patient_catalog("integer");

    let specs = parse_table_specs(["dbo.Patient:p[PatientID,Fax]", "dbo.Labor:l"], KEY)
        .expect("parse specs");
    let plan = validate_plan(specs, &PlanOptions::default()).expect("valid plan");
    let err = check_plan_against_catalog(&plan, &catalog).unwrap_err();
    assert!(err.has(IssueKind::UnknownColumn));
    assert!(err.has(IssueKind::UnknownTable));
    assert_eq!(err.issues.len(), 2);
}
