// tests/evaluator_tests.rs

use chrono::{DateTime, TimeZone, Timelike, Utc};
use odata_filter::{Filter, Value};
use serde::Serialize;

/// Test records mirror a typical persisted row: serde renames stand in for
/// column-name annotations and are honored by field lookup.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
struct TestRecord {
    name: String,
    #[serde(rename = "jsonInput")]
    json_input: String,
    int: i64,
    #[serde(rename = "Price")]
    price: f64,
    array: Vec<String>,
    #[serde(rename = "City")]
    city: String,
    #[serde(rename = "Country")]
    country: String,
    int_array: Vec<i64>,
    date: DateTime<Utc>,
    test_ptr: Option<Box<TestRecord>>,
}

fn zero_date() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(1, 1, 1, 0, 0, 0).unwrap()
}

fn blank() -> TestRecord {
    TestRecord {
        name: String::new(),
        json_input: String::new(),
        int: 0,
        price: 0.0,
        array: Vec::new(),
        city: String::new(),
        country: String::new(),
        int_array: Vec::new(),
        date: zero_date(),
        test_ptr: None,
    }
}

fn records() -> Vec<TestRecord> {
    vec![
        TestRecord {
            name: "structuredTest".to_string(),
            json_input: "jsonTest".to_string(),
            int: 1,
            array: vec!["1".into(), "2".into(), "3".into(), "5".into()],
            int_array: vec![1, 2, 3, 5],
            date: Utc.with_ymd_and_hms(2022, 9, 8, 4, 0, 0).unwrap(),
            test_ptr: Some(Box::new(blank())),
            ..blank()
        },
        TestRecord {
            name: "bob ".to_string(),
            int: -1,
            price: 2.55,
            array: vec!["5".into(), "2".into(), "3".into(), "1".into()],
            int_array: vec![5, 2, 3, 1],
            date: Utc
                .with_ymd_and_hms(2021, 8, 9, 0, 40, 40)
                .unwrap()
                .with_nanosecond(10_000)
                .unwrap(),
            ..blank()
        },
        TestRecord {
            name: "Milk".to_string(),
            int: 0,
            price: 2.55,
            array: vec!["Milk".into(), "Cheese".into()],
            ..blank()
        },
        TestRecord {
            name: "Milk".to_string(),
            int: 5,
            price: 1.1,
            array: vec!["Milk".into(), "Bob".into()],
            city: "Berlin".to_string(),
            country: "United States".to_string(),
            ..blank()
        },
        TestRecord {
            name: "Cheese".to_string(),
            int: 4,
            price: 10.1,
            city: "Berlin".to_string(),
            country: "Germany".to_string(),
            ..blank()
        },
    ]
}

fn filter_records(input: &str) -> Vec<TestRecord> {
    let evaluator = Filter::compile(input)
        .expect("compiles")
        .compile_for("memory")
        .expect("lowers")
        .into_evaluator()
        .expect("memory output is an evaluator");
    evaluator.filter_slice(&records()).expect("filters")
}

fn assert_selects(input: &str, indices: &[usize]) {
    let all = records();
    let want: Vec<TestRecord> = indices.iter().map(|&i| all[i].clone()).collect();
    assert_eq!(filter_records(input), want, "filter: {}", input);
}

// ============================================================================
// Literals and comparisons
// ============================================================================

#[test]
fn test_boolean_literals() {
    assert_selects("true", &[0, 1, 2, 3, 4]);
    assert_selects("false", &[]);
}

#[test]
fn test_string_comparisons_are_lexicographic() {
    assert_selects("Name eq 'Milk'", &[2, 3]);
    assert_selects("(Name eq 'Milk')", &[2, 3]);
    assert_selects("Name ne 'Milk'", &[0, 1, 4]);
    assert_selects("Name gt 'Milk'", &[0, 1]);
    assert_selects("Name ge 'Milk'", &[0, 1, 2, 3]);
    assert_selects("Name lt 'Milk'", &[4]);
    assert_selects("Name le 'Milk'", &[2, 3, 4]);
}

#[test]
fn test_null_matches_absent_pointers() {
    assert_selects("TestPtr eq null", &[1, 2, 3, 4]);
}

// ============================================================================
// Combinators
// ============================================================================

#[test]
fn test_and_or() {
    assert_selects("Name eq 'Milk' and Price lt 2.55", &[3]);
    assert_selects("Name EQ 'Milk' AND Price LT 2.55", &[3]);
    assert_selects("Name eq 'Milk' AND Price eq 2.55", &[2]);
    assert_selects("Name eq 'Milk' or Price lt 2.55", &[0, 2, 3]);
}

#[test]
fn test_not_inverts_the_inner_result() {
    assert_selects("not endswith(Name,'ilk')", &[0, 1, 4]);
}

// ============================================================================
// Collections
// ============================================================================

#[test]
fn test_in_membership() {
    assert_selects("Name in ('Milk', 'Cheese')", &[2, 3, 4]);
    assert_selects("Name in ['Milk', 'Cheese']", &[2, 3, 4]);
}

#[test]
fn test_hassubset_ignores_order() {
    assert_selects(r#"hassubset(Array,["Milk", "Cheese"])"#, &[2]);
}

#[test]
fn test_hassubsequence_respects_order() {
    assert_selects("hassubsequence(Array,['1','2','3'])", &[0]);
    assert_selects("hassubsequence(IntArray,[1,2,3])", &[0]);
}

// ============================================================================
// String functions
// ============================================================================

#[test]
fn test_string_predicates() {
    assert_selects("contains(Name,'red')", &[0]);
    assert_selects("endswith(Name,'ilk')", &[2, 3]);
    assert_selects("startswith(Name,'str')", &[0]);
    assert_selects("matchesPattern(Name,'^[A-Z]')", &[2, 3, 4]);
}

#[test]
fn test_string_transforms() {
    assert_selects("tolower(Name) eq 'structuredtest'", &[0]);
    assert_selects("toupper(Name) eq 'BOB '", &[1]);
    assert_selects("trim(Name) eq Name", &[0, 2, 3, 4]);
}

#[test]
fn test_length_indexof_substring() {
    assert_selects("length(Name) gt 4", &[0, 4]);
    assert_selects("indexof(Name,'Test') eq 10", &[0]);
    assert_selects("substring(Name,1) eq 'ob '", &[1]);
    assert_selects("substring(Name,1,3) eq 'hee'", &[4]);
}

#[test]
fn test_concat_resolves_fields_in_arguments() {
    assert_selects("concat(concat(City,', '),Country) eq 'Berlin, Germany'", &[4]);
}

// ============================================================================
// Arithmetic: decimal semantics on decimal-shaped inputs
// ============================================================================

#[test]
fn test_decimal_arithmetic() {
    assert_selects("Price add 2.45 eq 5.00", &[1, 2]);
    assert_selects("Price sub 0.55 eq 2.00", &[1, 2]);
    assert_selects("Price mul 2.0 eq 5.10", &[1, 2]);
    assert_selects("Price div 2.55 eq 1", &[1, 2]);
}

#[test]
fn test_integer_division_and_modulo() {
    assert_selects("Int div 2 eq 2", &[3, 4]);
    assert_selects("Int divby 2 eq 2.5", &[3]);
    assert_selects("Int mod 5 eq 0", &[2, 3]);
}

#[test]
fn test_rounding() {
    assert_selects("ceiling(Price) eq 3", &[1, 2]);
    assert_selects("floor(Price) eq 2", &[1, 2]);
    assert_selects("round(Price) eq 3", &[1, 2]);
}

// ============================================================================
// Date components
// ============================================================================

#[test]
fn test_date_components() {
    assert_selects("day(Date) eq 8", &[0]);
    assert_selects("hour(Date) eq 4", &[0]);
    assert_selects("minute(Date) eq 40", &[1]);
    assert_selects("month(Date) eq 9", &[0]);
    assert_selects("second(Date) eq 40", &[1]);
    assert_selects("year(Date) eq 2022", &[0]);
    assert_selects("fractionalseconds(Date) ge 0.01", &[1]);
}

// ============================================================================
// Error and tolerance behavior
// ============================================================================

#[test]
fn test_unknown_field_aborts() {
    let evaluator = Filter::compile("Missing eq 'x'")
        .unwrap()
        .compile_for("memory")
        .unwrap()
        .into_evaluator()
        .unwrap();
    assert!(evaluator.filter_slice(&records()).is_err());
}

#[test]
fn test_type_mismatch_selects_nothing_instead_of_failing() {
    // Int is numeric; a string comparison simply never matches.
    assert_selects("contains(Int,'1')", &[]);
}

#[test]
fn test_works_with_json_value_records() {
    let rows = vec![
        serde_json::json!({ "name": "Milk", "price": 2.55 }),
        serde_json::json!({ "name": "Bread", "price": 1.10 }),
    ];
    let evaluator = Filter::compile("price lt 2.0")
        .unwrap()
        .compile_for("memory")
        .unwrap()
        .into_evaluator()
        .unwrap();
    let kept = evaluator.filter_slice(&rows).unwrap();
    assert_eq!(kept, vec![rows[1].clone()]);
}

#[test]
fn test_substitution_in_evaluation() {
    let filter = Filter::compile("Name eq ':0'").unwrap();
    let evaluator = filter
        .compile_for_with_args("memory", &[Value::from("Cheese")])
        .unwrap()
        .into_evaluator()
        .unwrap();
    assert_eq!(evaluator.filter_slice(&records()).unwrap(), vec![records()[4].clone()]);
}
