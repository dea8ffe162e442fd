use crate::run::run_model::{RunResult, StepStatus};

// ============================================================================
// Console reporter: formatted terminal output
// ============================================================================

/// Format a run result for terminal output.
///
/// Produces output like:
/// ```text
/// === Run: signup (2 rows) ===
///
/// ✓ PASS  row 0 (3 passed, 1 skipped)
/// ✗ FAIL  row 1 (1 passed, 1 failed, 2 not run)
///     [FAIL] step s2 at locate: element not found after 9 strategies: ...
///
/// === Results: 1 rows passed, 1 failed in 2.4s ===
/// ```
pub fn format_console_report(result: &RunResult) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "=== Run: {} ({} rows) ===\n\n",
        result.sequence_name().unwrap_or("unnamed"),
        result.rows().len()
    ));

    for row in result.rows() {
        let marker = if row.passed() {
            "\u{2713} PASS"
        } else {
            "\u{2717} FAIL"
        };

        let mut counts = vec![format!("{} passed", row.count(StepStatus::Passed))];
        for (status, label) in [
            (StepStatus::Failed, "failed"),
            (StepStatus::Skipped, "skipped"),
            (StepStatus::NotRun, "not run"),
        ] {
            let n = row.count(status);
            if n > 0 {
                counts.push(format!("{} {}", n, label));
            }
        }
        out.push_str(&format!("{}  row {} ({})\n", marker, row.row_index, counts.join(", ")));

        for step in row.steps.iter().filter(|s| s.status == StepStatus::Failed) {
            out.push_str(&format!(
                "    [FAIL] step {} at {}: {}\n",
                step.step_id,
                step.stage.as_deref().unwrap_or("?"),
                step.message.as_deref().unwrap_or("failed")
            ));
        }
        if row.error.is_some() && row.count(StepStatus::Failed) == 0 {
            out.push_str(&format!("    [ERROR] {}\n", row.error.as_deref().unwrap_or_default()));
        }
    }

    out.push_str(&format!(
        "\n=== Results: {} rows passed, {} failed in {:.1}s",
        result.rows_passed(),
        result.rows_failed(),
        result.duration_ms() as f64 / 1000.0
    ));
    if result.cancelled() {
        out.push_str(" (cancelled)");
    }
    out.push_str(" ===\n");

    out
}
