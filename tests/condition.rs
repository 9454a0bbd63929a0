//! Declarative conditions.

use anyhow::Result;
use regex::Regex;
use rowflow::*;

fn sample() -> Row {
    row! { "name" => "Cheryl", "gender" => "female", "age" => 32 }
}

#[test]
fn empty_condition_matches_everything() -> Result<()> {
    let cond = Condition::new();
    assert!(cond.is_empty());
    assert!(cond.test(&sample())?);
    assert!(cond.test(&Row::new())?);
    Ok(())
}

#[test]
fn equality_is_strict_per_type() -> Result<()> {
    assert!(Condition::new().eq("age", 32).test(&sample())?);
    assert!(!Condition::new().eq("age", "32").test(&sample())?);
    assert!(!Condition::new().eq("missing", "x").test(&sample())?);
    Ok(())
}

#[test]
fn any_treats_missing_column_as_null() -> Result<()> {
    let cond = Condition::new().any("nickname", [Value::Null, Value::from("Cher")]);
    assert!(cond.test(&sample())?);
    assert!(!Condition::new().any("gender", ["male"]).test(&sample())?);
    Ok(())
}

#[test]
fn pattern_searches_string_form() -> Result<()> {
    assert!(Condition::new().matches("age", Regex::new("^3")?).test(&sample())?);
    assert!(!Condition::new().matches("name", Regex::new("^h")?).test(&sample())?);
    Ok(())
}

#[test]
fn pattern_and_closure_require_the_column() -> Result<()> {
    let err = Condition::new()
        .matches("nickname", Regex::new(".")?)
        .test(&sample())
        .expect_err("missing column");
    assert!(matches!(err, EtlError::MissingColumn { ref column, .. } if column == "nickname"));

    let err = Condition::new()
        .when("nickname", Value::is_null)
        .test(&sample())
        .expect_err("missing column");
    assert!(matches!(err, EtlError::MissingColumn { .. }));
    Ok(())
}

#[test]
fn first_failure_short_circuits() -> Result<()> {
    // The second test would fail on the missing column if it ran.
    let cond = Condition::new()
        .eq("gender", "male")
        .matches("nickname", Regex::new(".")?);
    assert!(!cond.test(&sample())?);
    Ok(())
}

#[test]
fn criteria_pick_the_combinator() -> Result<()> {
    let cond: Condition = vec![
        ("gender", Criterion::from("female")),
        ("name", Criterion::from(vec!["Bill", "Cheryl"])),
        ("name", Criterion::from(Regex::new("yl$")?)),
        ("age", Criterion::test(|v| v.as_i64().is_some_and(|a| a > 30))),
    ]
    .into_iter()
    .collect();
    assert_eq!(cond.len(), 4);
    assert!(cond.test(&sample())?);
    assert_eq!(
        cond.to_string(),
        "gender = female, name in [Bill,Cheryl], name -> yl$, age -> {}"
    );
    Ok(())
}
