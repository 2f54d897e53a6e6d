// tests/mysql_tests.rs

use odata_filter::{Error, Filter, Value};

fn mysql(input: &str) -> String {
    Filter::compile(input)
        .expect("compiles")
        .compile_for("mysql")
        .expect("lowers")
        .into_sql()
        .expect("mysql output is a string")
}

// ============================================================================
// Lowering table
// ============================================================================

#[test]
fn test_literals() {
    assert_eq!(mysql("true"), "1=1");
    assert_eq!(mysql("false"), "1=0");
}

#[test]
fn test_comparisons() {
    let cases = [
        ("Name eq 'Milk'", "`Name`='Milk'"),
        ("(Name eq 'Milk')", "`Name`='Milk'"),
        ("Name ne 'Milk'", "`Name`!='Milk'"),
        ("Name gt 'Milk'", "`Name`>'Milk'"),
        ("Name ge 'Milk'", "`Name`>='Milk'"),
        ("Name lt 'Milk'", "`Name`<'Milk'"),
        ("Name le 'Milk'", "`Name`<='Milk'"),
    ];
    for (input, want) in cases {
        assert_eq!(mysql(input), want, "input: {}", input);
    }
}

#[test]
fn test_combinators() {
    let cases = [
        (
            "Name eq 'Milk' and Price lt 2.55",
            "`Name`='Milk' AND `Price`<2.55",
        ),
        (
            "Name EQ 'Milk' AND Price LT 2.55",
            "`Name`='Milk' AND `Price`<2.55",
        ),
        (
            "Name eq 'Milk' AND Price lt 2.55",
            "`Name`='Milk' AND `Price`<2.55",
        ),
        (
            "Name eq 'Milk' or Price lt 2.55",
            "`Name`='Milk' OR `Price`<2.55",
        ),
    ];
    for (input, want) in cases {
        assert_eq!(mysql(input), want, "input: {}", input);
    }
}

#[test]
fn test_in_lists() {
    assert_eq!(mysql("Name in ('Milk', 'Cheese')"), "`Name` IN ('Milk','Cheese')");
    assert_eq!(mysql("Name in ['Milk', 'Cheese']"), "`Name` IN ('Milk','Cheese')");
}

#[test]
fn test_string_functions_lower_to_like() {
    assert_eq!(mysql("contains(Name,'red')"), "`Name` LIKE '%red%'");
    assert_eq!(mysql("endswith(Name,'ilk')"), "`Name` LIKE '%ilk'");
    assert_eq!(
        mysql("startswith(CompanyName,'Futterkiste')"),
        "`CompanyName` LIKE 'Futterkiste%'"
    );
}

#[test]
fn test_not_splices_into_the_clause() {
    assert_eq!(mysql("not endswith(Name,'ilk')"), "`Name` NOT LIKE '%ilk'");
}

#[test]
fn test_length_is_not_escaped_as_a_column() {
    assert_eq!(mysql("length(CompanyName) eq 19"), "LENGTH(`CompanyName`)=19");
}

#[test]
fn test_object_literal_serializes_with_sorted_keys_and_escaped_quotes() {
    assert_eq!(
        mysql(r#"Address eq {"Street":"NE 40th","City":"Redmond","State":"WA","ZipCode":"98052"}"#),
        r#"`Address`='{\"City\":\"Redmond\",\"State\":\"WA\",\"Street\":\"NE 40th\",\"ZipCode\":\"98052\"}'"#
    );
}

#[test]
fn test_hassubset_uses_json_contains() {
    assert_eq!(
        mysql(r#"hassubset(Names,["Milk", "Cheese"])"#),
        r#"JSON_CONTAINS(`Names`,'["Milk","Cheese"]')"#
    );
}

#[test]
fn test_arithmetic() {
    let cases = [
        ("Price add 2.45 eq 5.00", "`Price`+2.45=5"),
        ("Price sub 0.55 eq 2.00", "`Price`-0.55=2"),
        ("Price mul 2.0 eq 5.10", "`Price`*2=5.1"),
        ("Price div 2.55 eq 1", "`Price`/2.55=1"),
        ("Rating div 2 eq 2", "`Rating` DIV 2=2"),
        ("Rating divby 2 eq 2.5", "`Rating`/2=2.5"),
        ("Rating mod 5 eq 0", "`Rating` MOD 5=0"),
    ];
    for (input, want) in cases {
        assert_eq!(mysql(input), want, "input: {}", input);
    }
}

#[test]
fn test_grouped_arithmetic_keeps_parentheses() {
    assert_eq!(mysql("(4 add 5) mod (4 sub 1) eq 0"), "(4+5) MOD (4-1)=0");
}

// ============================================================================
// Placeholder substitution
// ============================================================================

#[test]
fn test_substitution_rewrites_placeholders() {
    let filter = Filter::compile("year eq ':0'").expect("compiles");
    assert_eq!(
        filter.compile_for("mysql").unwrap().into_sql().unwrap(),
        "`year`=':0'"
    );
    assert_eq!(
        filter
            .compile_for_with_args("mysql", &[Value::from(2025)])
            .unwrap()
            .into_sql()
            .unwrap(),
        "`year`=2025"
    );
    // The unbound filter is reusable afterwards.
    assert_eq!(
        filter.compile_for("mysql").unwrap().into_sql().unwrap(),
        "`year`=':0'"
    );
}

#[test]
fn test_substitution_matches_literal_source() {
    let bound = Filter::compile("Name eq ':0' and Price lt ':1'")
        .expect("compiles")
        .with_replacements(&[Value::from("Milk"), Value::from(2.55)])
        .expect("substitutes");
    assert_eq!(
        bound.compile_for("mysql").unwrap().into_sql().unwrap(),
        mysql("Name eq 'Milk' and Price lt 2.55")
    );
}

// ============================================================================
// Failure modes
// ============================================================================

#[test]
fn test_unsupported_operator_surfaces() {
    let filter = Filter::compile("style has 'Yellow'").expect("parses");
    assert!(matches!(
        filter.compile_for("mysql"),
        Err(Error::UnknownOperator(_))
    ));
}

#[test]
fn test_null_operand_is_unsupported() {
    let filter = Filter::compile("Name eq null").expect("parses");
    assert!(matches!(
        filter.compile_for("mysql"),
        Err(Error::UnsupportedOperand(_))
    ));
}
