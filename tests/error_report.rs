// tests/error_report.rs

use anyhow::Context;
use optask::error_report;
use optask::errors::OptaskError;

#[test]
fn test_error_report_is_single_line_context_chain() {
    let result: anyhow::Result<()> =
        Err(OptaskError::TaskNotFound("slow".to_string())).context("showing run 1");
    let err = result.unwrap_err();

    let report = error_report(&err);

    assert_eq!(report, "optask error: showing run 1: Task not found: slow");
    assert!(!report.contains('\n'));
}

#[test]
fn test_error_report_without_context() {
    let err = anyhow::Error::from(OptaskError::InvalidRunId("abc".to_string()));
    assert_eq!(error_report(&err), "optask error: Invalid run id: abc");
}
