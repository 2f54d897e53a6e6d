// tests/gorm_tests.rs

use std::collections::HashMap;

use odata_filter::{Error, Filter, SqlClause, Value};

fn gorm(input: &str) -> SqlClause {
    Filter::compile(input)
        .expect("compiles")
        .compile_for("gorm")
        .expect("lowers")
        .into_clause()
        .expect("gorm output is a clause")
}

fn clause(fragment: &str, args: Vec<Value>) -> SqlClause {
    SqlClause {
        clause: fragment.to_string(),
        args,
    }
}

// ============================================================================
// Lowering table
// ============================================================================

#[test]
fn test_comparisons() {
    let cases = [
        ("Name eq 'Milk'", "Name = ?"),
        ("(Name eq 'Milk')", "Name = ?"),
        ("Name ne 'Milk'", "Name != ?"),
        ("Name gt 'Milk'", "Name > ?"),
        ("Name ge 'Milk'", "Name >= ?"),
        ("Name lt 'Milk'", "Name < ?"),
        ("Name le 'Milk'", "Name <= ?"),
    ];
    for (input, fragment) in cases {
        assert_eq!(
            gorm(input),
            clause(fragment, vec![Value::from("Milk")]),
            "input: {}",
            input
        );
    }
}

#[test]
fn test_combinators_splice_clauses_and_args() {
    let want = clause(
        "Name = ? AND Price < ?",
        vec![Value::from("Milk"), Value::from(2.55)],
    );
    assert_eq!(gorm("Name eq 'Milk' and Price lt 2.55"), want);
    assert_eq!(gorm("Name EQ 'Milk' AND Price LT 2.55"), want);
    assert_eq!(
        gorm("Name eq 'Milk' or Price lt 2.55"),
        clause(
            "Name = ? OR Price < ?",
            vec![Value::from("Milk"), Value::from(2.55)],
        )
    );
}

#[test]
fn test_in_passes_the_list_as_one_arg() {
    let want = clause(
        "Name IN ?",
        vec![Value::Array(vec![Value::from("Milk"), Value::from("Cheese")])],
    );
    assert_eq!(gorm("Name in ('Milk', 'Cheese')"), want);
    assert_eq!(gorm("Name in ['Milk', 'Cheese']"), want);
}

#[test]
fn test_like_patterns() {
    assert_eq!(
        gorm("contains(Name,'red')"),
        clause("Name LIKE ?", vec![Value::from("%red%")])
    );
    assert_eq!(
        gorm("endswith(Name,'ilk')"),
        clause("Name LIKE ?", vec![Value::from("%ilk")])
    );
    assert_eq!(
        gorm("startswith(CompanyName,'Futterkiste')"),
        clause("CompanyName LIKE ?", vec![Value::from("Futterkiste%")])
    );
}

#[test]
fn test_not_splices_into_the_fragment() {
    assert_eq!(
        gorm("not endswith(Name,'ilk')"),
        clause("Name NOT LIKE ?", vec![Value::from("%ilk")])
    );
}

#[test]
fn test_object_literal_binds_as_a_map() {
    let mut address = HashMap::new();
    for (key, value) in [
        ("Street", "NE 40th"),
        ("City", "Redmond"),
        ("State", "WA"),
        ("ZipCode", "98052"),
    ] {
        address.insert(key.to_string(), Value::from(value));
    }
    assert_eq!(
        gorm(r#"Address eq {"Street":"NE 40th","City":"Redmond","State":"WA","ZipCode":"98052"}"#),
        clause("Address = ?", vec![Value::Object(address)])
    );
}

// ============================================================================
// Placeholder substitution
// ============================================================================

#[test]
fn test_substitution() {
    let filter = Filter::compile("year eq ':1' and id eq ':0'").expect("compiles");
    assert_eq!(
        filter
            .compile_for_with_args("gorm", &[Value::from("test"), Value::from(2025)])
            .unwrap()
            .into_clause()
            .unwrap(),
        clause(
            "year = ? AND id = ?",
            vec![Value::from(2025), Value::from("test")],
        )
    );
}

// ============================================================================
// Failure modes
// ============================================================================

#[test]
fn test_operators_without_gorm_lowerings() {
    for input in ["true", "length(Name) eq 4", "Price add 1.0 eq 2.0"] {
        let filter = Filter::compile(input).expect("parses");
        assert!(
            matches!(filter.compile_for("gorm"), Err(Error::UnknownOperator(_))),
            "input: {}",
            input
        );
    }
}
