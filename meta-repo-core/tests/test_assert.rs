//! Tests for `crate::assert`'s structural `RepoAST` diffing.

use metarepo::assert::{assert_equal_asts, diff_asts};
use metarepo::codec::parse;

#[test]
fn identical_asts_have_no_diff() {
    let a = parse("S:C2-1 foo=bar;Bmaster=2;H=2").unwrap();
    let b = parse("S:C2-1 foo=bar;Bmaster=2;H=2").unwrap();
    assert_equal_asts(&a[""], &b[""]);
}

#[test]
fn wildcard_commit_message_matches_anything() {
    let actual = parse("S:C2-1 foo=bar;Bmaster=2;H=2").unwrap();
    let mut expected = actual.clone();
    expected
        .get_mut("")
        .unwrap()
        .commits
        .get_mut(&metarepo::ast::CommitId::from("2"))
        .unwrap()
        .message = Some("*".to_owned());
    assert_equal_asts(&actual[""], &expected[""]);
}

#[test]
fn missing_branch_is_reported() {
    let actual = parse("S").unwrap();
    let expected = parse("S:Bother=1").unwrap();
    let diffs = diff_asts(&actual[""], &expected[""]);
    assert!(diffs.iter().any(|line| line.contains("branch 'other'") && line.contains("missing")));
}

#[test]
fn differing_branch_target_is_reported() {
    let actual = parse("S:C2-1;Bmaster=2;H=2").unwrap();
    let expected = parse("S").unwrap();
    let diffs = diff_asts(&actual[""], &expected[""]);
    assert!(diffs.iter().any(|line| line.starts_with("branch 'master'")));
}

#[test]
#[should_panic(expected = "RepoAST mismatch")]
fn assert_equal_asts_panics_on_mismatch() {
    let actual = parse("S").unwrap();
    let expected = parse("S:Bother=1").unwrap();
    assert_equal_asts(&actual[""], &expected[""]);
}
