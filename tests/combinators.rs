//! Branch, exchange, inject, concat, group-by and sort.

use anyhow::Result;
use rowflow::testing::*;
use rowflow::*;

#[macro_use]
mod macros;

fn id_of(row: &Row) -> String {
    row.get("id").map(ToString::to_string).unwrap_or_default()
}

#[test]
fn branch_sees_every_row_and_completes_with_parent() -> Result<()> {
    init_tracing!();
    let seen = Capture::new();
    let sink = seen.sink();
    let mut child = None;
    let (rows, stats) = run_collect(&from_rows(people()).branch(|c| {
        child = Some(c.clone());
        c.filter(Condition::new().eq("gender", "female"))
            .add_step("collect", sink)
    }))?;

    assert_eq!(rows.len(), 4);
    assert_eq!(stats.loaded(), 4);
    assert_column_values(
        &seen.rows(),
        "name",
        &[Value::from("Cheryl Lipscome"), Value::from("Diana Rogers")],
    );
    let child = child.expect("branch configured");
    assert!(child.is_completed());
    assert_eq!(child.name(), "No Name Branch");
    let child_stats = child.statistic();
    assert_eq!(child_stats.loaded(), 2);
    assert_rejected!(child_stats, IgnoreRow, "filter gender = female", 2);
    Ok(())
}

#[test]
fn branch_changes_do_not_leak_into_parent() -> Result<()> {
    let (rows, _) = run_collect(
        &from_rows(people()).branch_named("scratch", |c| c.set_field("name", "overwritten")),
    )?;
    assert_eq!(rows[0].get("name"), Some(&Value::from("Bill Rhodes")));
    Ok(())
}

#[test]
fn conditional_branch_copies_matching_rows_only() -> Result<()> {
    let seen = Capture::new();
    let sink = seen.sink();
    let (rows, stats) = run_collect(
        &from_rows(people()).branch_when(Condition::new().eq("gender", "male"), |c| {
            c.add_step("collect", sink)
        }),
    )?;
    assert_eq!(rows.len(), 4);
    assert_eq!(seen.len(), 2);
    assert!(stats.step_timings().contains_key("branch(gender = male)"));
    Ok(())
}

#[test]
fn halt_in_branch_stops_the_parent() -> Result<()> {
    let (rows, stats) = run_collect(&from_rows(people()).branch(|c| c.limit(1)))?;
    assert_eq!(rows.len(), 1);
    assert_eq!(stats.loaded(), 1);
    Ok(())
}

#[test]
fn exchange_collects_rows_from_per_row_pipelines() -> Result<()> {
    let upstream = from_rows(people()).filter(Condition::new().eq("gender", "male"));
    let (rows, stats) = run_collect(&upstream.exchange(|row: &Row| {
        Ok(from_rows(
            (1..=2).map(|copy| row.clone().with("copy", copy)).collect(),
        ))
    }))?;

    let ids: Vec<String> = rows.iter().map(id_of).collect();
    assert_eq!(ids, ["1", "1", "4", "4"]);
    assert_column_values(&rows, "copy", &[1, 2, 1, 2].map(Value::from));
    assert_eq!(stats.loaded(), 4);
    assert_rejected!(stats, IgnoreRow, "filter gender = male", 2);
    Ok(())
}

#[test]
fn inject_expands_rows_and_rejects_none() -> Result<()> {
    let rejected = Capture::new();
    let sink = rejected.sink();
    let next = from_rows(people())
        .inject(|row: &Row| {
            Ok(match id_of(row).as_str() {
                "3" => None,
                "4" => Some(Vec::new()),
                _ => Some(vec![row.clone(), row.clone().with("dup", true)]),
            })
        })
        .on_rejection(move |r| r.add_step("collect", sink));
    let (rows, stats) = run_collect(&next)?;

    let ids: Vec<String> = rows.iter().map(id_of).collect();
    assert_eq!(ids, ["1", "1", "2", "2"]);
    assert_rejected!(stats, Rejection, "inject()", 1);
    let bad = &rejected.rows()[0];
    assert_eq!(id_of(bad), "3");
    assert_eq!(bad.get(REJECTION_REASON), Some(&Value::from("Unknown reason")));
    Ok(())
}

#[test]
fn inject_passes_pre_rejected_rows_to_rejections() -> Result<()> {
    let next = from_rows(people()).inject_named("lookup", |row: &Row| {
        let out = if id_of(row) == "2" {
            row.clone().reject("no hobbies", RejectionCategory::ResourceNotFound)
        } else {
            row.clone()
        };
        Ok(Some(vec![out]))
    });
    let (rows, stats) = run_collect(&next)?;
    assert_eq!(rows.len(), 3);
    assert_eq!(stats.rejections_in(RejectionCategory::ResourceNotFound), 1);
    Ok(())
}

#[test]
fn concat_runs_second_source_through_same_steps() -> Result<()> {
    let all = people();
    let first = from_rows(all[..2].to_vec()).as_int("age");
    let second = from_rows(all[2..].to_vec());
    let first = first.concat(second);
    let (rows, stats) = run_collect(&first)?;

    assert_column_values(&rows, "age", &[41, 32, 25, 30].map(Value::from));
    assert_eq!(stats.loaded(), 4);
    assert_eq!(first.last_line(), 4);
    Ok(())
}

#[test]
fn concat_rows_reach_save_before_the_file_closes() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("both.csv");
    let all = people();
    let stats = from_rows(all[..2].to_vec())
        .save(&path)?
        .concat(from_rows(all[2..].to_vec()))
        .go()?;

    assert_eq!(stats.loaded(), 4);
    let saved = read_csv(&path, CsvOptions::default())?;
    let ids: Vec<String> = saved.iter().map(id_of).collect();
    assert_eq!(ids, ["1", "2", "3", "4"]);
    Ok(())
}

#[test]
fn halt_inside_concat_stops_the_stream() -> Result<()> {
    let all = people();
    let third = from_rows(vec![all[0].clone()]);
    let first = from_rows(all[..2].to_vec())
        .limit(3)
        .concat(from_rows(all[2..].to_vec()))
        .concat(third.clone());
    let (rows, stats) = run_collect(&first)?;

    let ids: Vec<String> = rows.iter().map(id_of).collect();
    assert_eq!(ids, ["1", "2", "3"]);
    assert_eq!(stats.loaded(), 3);
    assert!(!third.is_completed());
    Ok(())
}

#[test]
fn halted_exchange_pipelines_leave_upstream_running() -> Result<()> {
    let upstream = from_rows(people());
    let handle = upstream.clone();
    let (rows, stats) = run_collect(&upstream.exchange(|row: &Row| {
        Ok(from_rows(vec![row.clone(), row.clone()]).limit(1))
    }))?;

    let ids: Vec<String> = rows.iter().map(id_of).collect();
    assert_eq!(ids, ["1", "2", "3", "4"]);
    assert_eq!(stats.loaded(), 4);
    assert_eq!(handle.statistic().loaded(), 4);
    Ok(())
}

#[test]
fn group_by_builds_nested_index() -> Result<()> {
    let (rows, stats) = run_collect(&from_rows(people()).group_by(["gender", "age"]))?;
    assert_eq!(rows.len(), 1);
    assert_eq!(stats.loaded(), 1);

    let tree = &rows[0];
    assert_eq!(tree.keys().collect::<Vec<_>>(), ["male", "female"]);
    let female = tree.get("female").and_then(Value::as_row).expect("female level");
    let thirty_two = female.get("32").and_then(Value::as_list).expect("leaf list");
    assert_eq!(thirty_two.len(), 1);
    assert_eq!(
        thirty_two[0].as_row().and_then(|r| r.get("name")),
        Some(&Value::from("Cheryl Lipscome"))
    );
    Ok(())
}

#[test]
fn group_by_single_column_lists_rows() -> Result<()> {
    let (rows, _) = run_collect(&from_rows(people()).group_by(["gender"]))?;
    let males = rows[0].get("male").and_then(Value::as_list).expect("male list");
    let ids: Vec<String> = males.iter().filter_map(Value::as_row).map(id_of).collect();
    assert_eq!(ids, ["1", "4"]);
    Ok(())
}

#[test]
fn group_by_missing_column_fails() {
    let err = from_rows(people())
        .group_by(["team"])
        .go()
        .expect_err("grouping on a missing column must fail");
    assert!(err.is_step_failure());
}

#[test]
fn sort_orders_by_natural_value_order() -> Result<()> {
    let input = vec![row! { "age" => 30 }, row! { "age" => 10 }, row! { "age" => 20 }];
    let (rows, stats) = run_collect(&from_rows(input).sort(["age"]))?;
    assert_column_values(&rows, "age", &[10, 20, 30].map(Value::from));
    assert_eq!(stats.loaded(), 3);
    Ok(())
}

#[test]
fn sort_is_stable_and_uses_tie_breakers() -> Result<()> {
    let input = vec![
        row! { "k" => 1, "t" => 2, "n" => "a" },
        row! { "k" => 0, "t" => 9, "n" => "b" },
        row! { "k" => 1, "t" => 1, "n" => "c" },
        row! { "k" => 1, "t" => 2, "n" => "d" },
    ];
    let (rows, _) = run_collect(&from_rows(input).sort(["k", "t"]))?;
    assert_column_values(&rows, "n", &["b", "c", "a", "d"].map(Value::from));
    Ok(())
}

#[test]
fn sort_carries_upstream_rejections_and_obeys_downstream_halt() -> Result<()> {
    let sorted = from_rows(people())
        .as_int("age")
        .filter(Condition::new().eq("gender", "male"))
        .sort(["age"])
        .limit(1);
    let (rows, stats) = run_collect(&sorted)?;
    assert_column_values(&rows, "name", &[Value::from("Jack Lowland")]);
    assert_rejected!(stats, IgnoreRow, "filter gender = male", 2);
    Ok(())
}
