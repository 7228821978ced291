//! Rebase driving, conflicts, continue and abort.

#![allow(clippy::expect_used, clippy::unwrap_used)]

mod common;

use std::sync::{Arc, Mutex};

use common::TestRepo;
use splice_core::{
    CancelHandle, DriverState, Error, Failure, OperationResult, Precondition, Progress,
    ProgressSink,
};
use splice_git::{ConflictKind, OperationState};

/// `main` gains `main_file`, `feature` gains `feature_files` on the old base.
fn diverged(repo: &TestRepo, main_file: (&str, &str), feature_files: &[(&str, &str, &str)]) {
    repo.git(&["branch", "feature"]);
    repo.commit_file(main_file.0, main_file.1, "main work");
    repo.git(&["checkout", "--quiet", "feature"]);
    for (name, contents, message) in feature_files {
        repo.commit_file(name, contents, message);
    }
}

#[test]
fn test_rebase_clean() {
    let repo = TestRepo::new();
    diverged(
        &repo,
        ("main.txt", "main\n"),
        &[("f1.txt", "1\n", "feature one"), ("f2.txt", "2\n", "feature two")],
    );

    let mut driver = repo.driver();
    let result = driver.rebase("main", "feature").unwrap();

    assert_eq!(result, OperationResult::CompletedWithoutError);
    assert_eq!(
        repo.summaries(),
        vec!["feature two", "feature one", "main work", "Initial commit"]
    );
    assert_eq!(repo.current_branch(), "feature");
    assert!(!repo.has_journal());
}

#[test]
fn test_rebase_unknown_target() {
    let repo = TestRepo::new();
    let mut driver = repo.driver();

    let result = driver.rebase("nope", "main").unwrap();

    assert!(matches!(
        result,
        OperationResult::Error(Failure::InvalidPlan(_))
    ));
    assert_eq!(driver.state(), DriverState::Idle);
}

#[test]
fn test_rebase_conflict_then_continue() {
    let repo = TestRepo::new();
    diverged(
        &repo,
        ("conflict.txt", "main\n"),
        &[
            ("conflict.txt", "feature\n", "feature edit"),
            ("other.txt", "other\n", "feature follow-up"),
        ],
    );
    let feature_tip = repo.head();
    let main_tip = repo.rev("main");

    let mut driver = repo.driver();
    let result = driver.rebase("main", "feature").unwrap();
    assert_eq!(result, OperationResult::ConflictsEncountered);
    assert_eq!(driver.state(), DriverState::Conflicted);

    let OperationState::Rebase(rebase) = driver.operation_state().unwrap() else {
        panic!("expected a rebase in progress");
    };
    assert_eq!(rebase.original_branch_tip, feature_tip);
    assert_eq!(rebase.base_branch_tip, main_tip);
    assert_eq!(rebase.target_branch.as_deref(), Some("feature"));

    let session = driver.session().unwrap();
    assert_eq!(session.current_step, 1);
    assert_eq!(session.total_steps, 2);

    let conflicts = driver.conflicts().unwrap();
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].path, "conflict.txt");
    assert_eq!(conflicts[0].kind, ConflictKind::BothAdded);
    assert_eq!(conflicts[0].marker_count, Some(1));

    // Nothing resolved yet: nothing is staged and git is left as it was.
    let result = driver.continue_operation::<&str>(&[]).unwrap();
    assert_eq!(result, OperationResult::OutstandingFilesNotStaged);
    assert_eq!(driver.conflicts().unwrap().len(), 1);
    assert_eq!(driver.session().unwrap().current_step, 1);
    assert_eq!(driver.state(), DriverState::Conflicted);

    repo.write("conflict.txt", "resolved\n");
    let result = driver.continue_operation(&["conflict.txt"]).unwrap();

    assert_eq!(result, OperationResult::CompletedWithoutError);
    assert_eq!(
        repo.summaries(),
        vec!["feature follow-up", "feature edit", "main work", "Initial commit"]
    );
    assert_eq!(repo.read("conflict.txt"), "resolved\n");
    assert_eq!(repo.current_branch(), "feature");
    assert!(!repo.has_journal());
}

#[test]
fn test_rebase_abort_restores_branch() {
    let repo = TestRepo::new();
    diverged(
        &repo,
        ("conflict.txt", "main\n"),
        &[("conflict.txt", "feature\n", "feature edit")],
    );
    let before = repo.head();

    let mut driver = repo.driver();
    assert_eq!(
        driver.rebase("main", "feature").unwrap(),
        OperationResult::ConflictsEncountered
    );

    driver.abort().unwrap();

    assert_eq!(driver.state(), DriverState::Aborted);
    assert_eq!(repo.head(), before);
    assert_eq!(repo.current_branch(), "feature");
    assert!(driver.operation_state().unwrap().is_none());
    assert!(driver.status().unwrap().files.is_empty());
    assert!(!repo.has_journal());
}

#[test]
fn test_begin_refuses_while_rebase_in_progress() {
    let repo = TestRepo::new();
    diverged(
        &repo,
        ("conflict.txt", "main\n"),
        &[("conflict.txt", "feature\n", "feature edit")],
    );

    let mut driver = repo.driver();
    assert_eq!(
        driver.rebase("main", "feature").unwrap(),
        OperationResult::ConflictsEncountered
    );

    let mut second = repo.driver();
    let result = second.rebase("main", "feature").unwrap();
    assert_eq!(
        result,
        OperationResult::Error(Failure::Precondition(Precondition::OperationInProgress(
            "rebase"
        )))
    );
}

#[test]
fn test_abort_with_nothing_in_progress_is_error() {
    let repo = TestRepo::new();
    let mut driver = repo.driver();

    assert!(matches!(driver.abort(), Err(Error::Git(_))));
    assert!(!repo.has_journal());
}

#[test]
fn test_continue_with_nothing_in_progress() {
    let repo = TestRepo::new();
    let mut driver = repo.driver();

    let result = driver.continue_operation::<&str>(&[]).unwrap();
    assert_eq!(
        result,
        OperationResult::Error(Failure::Precondition(Precondition::NothingInProgress))
    );
}

#[derive(Default, Clone)]
struct Recorder {
    values: Arc<Mutex<Vec<f64>>>,
    results: Arc<Mutex<Vec<OperationResult>>>,
}

impl ProgressSink for Recorder {
    fn on_progress(&mut self, progress: &Progress) {
        self.values.lock().unwrap().push(progress.value);
    }

    fn on_result(&mut self, result: &OperationResult) {
        self.results.lock().unwrap().push(result.clone());
    }
}

#[test]
fn test_progress_is_monotonic_with_one_result() {
    let repo = TestRepo::new();
    diverged(
        &repo,
        ("main.txt", "main\n"),
        &[
            ("f1.txt", "1\n", "one"),
            ("f2.txt", "2\n", "two"),
            ("f3.txt", "3\n", "three"),
        ],
    );

    let recorder = Recorder::default();
    let mut driver = repo.driver();
    driver.set_progress_sink(Box::new(recorder.clone()));

    let result = driver.rebase("main", "feature").unwrap();
    assert_eq!(result, OperationResult::CompletedWithoutError);

    let values = recorder.values.lock().unwrap().clone();
    assert!(!values.is_empty());
    assert!(values.windows(2).all(|w| w[0] < w[1]), "{values:?}");
    assert!((values[values.len() - 1] - 1.0).abs() < f64::EPSILON);
    assert_eq!(
        *recorder.results.lock().unwrap(),
        vec![OperationResult::CompletedWithoutError]
    );
}

#[test]
fn test_cancel_before_begin_is_cleared() {
    let repo = TestRepo::new();
    diverged(
        &repo,
        ("main.txt", "main\n"),
        &[("f1.txt", "1\n", "one"), ("f2.txt", "2\n", "two")],
    );
    let before = repo.head();

    let mut driver = repo.driver();
    let cancel = driver.cancel_handle();

    // A request made before `begin` is cleared when the operation starts.
    cancel.cancel();
    let result = driver.rebase("main", "feature").unwrap();
    assert_eq!(result, OperationResult::CompletedWithoutError);
    assert_ne!(repo.head(), before);
}

/// Requests cancellation as soon as the first step is reported.
struct CancelOnFirstStep(CancelHandle);

impl ProgressSink for CancelOnFirstStep {
    fn on_progress(&mut self, _progress: &Progress) {
        self.0.cancel();
    }
}

#[test]
fn test_cancel_between_steps_aborts() {
    let repo = TestRepo::new();
    diverged(
        &repo,
        ("main.txt", "main\n"),
        &[("f1.txt", "1\n", "one"), ("f2.txt", "2\n", "two")],
    );
    let before = repo.head();

    let mut driver = repo.driver();
    let sink = CancelOnFirstStep(driver.cancel_handle());
    driver.set_progress_sink(Box::new(sink));

    let result = driver.rebase("main", "feature").unwrap();

    assert_eq!(result, OperationResult::Error(Failure::Cancelled));
    assert_eq!(driver.state(), DriverState::Aborted);
    assert_eq!(repo.head(), before);
    assert_eq!(repo.current_branch(), "feature");
    assert!(!repo.has_journal());
}
