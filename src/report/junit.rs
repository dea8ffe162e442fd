use crate::run::run_model::{RunResult, StepStatus};

// ============================================================================
// JUnit XML reporter for CI
// ============================================================================

/// Generate a JUnit XML report with one testcase per data row.
///
/// ```xml
/// <?xml version="1.0" encoding="UTF-8"?>
/// <testsuite name="signup" tests="2" failures="1" skipped="0" time="2.400">
///   <testcase name="row 0" classname="replay-engine" />
///   <testcase name="row 1" classname="replay-engine">
///     <failure message="step s2 failed at locate" type="locate">...</failure>
///   </testcase>
/// </testsuite>
/// ```
pub fn generate_junit_xml(result: &RunResult) -> String {
    let mut cases = String::new();
    let mut skipped = 0;

    for row in result.rows() {
        let name = format!("row {}", row.row_index);
        let time = format!("{:.3}", row.duration_ms as f64 / 1000.0);

        if row.passed() {
            cases.push_str(&format!(
                "  <testcase name=\"{}\" classname=\"replay-engine\" time=\"{}\" />\n",
                escape_xml(&name),
                time
            ));
            continue;
        }

        let failed = row.steps.iter().find(|s| s.status == StepStatus::Failed);
        let never_started = row.steps.iter().all(|s| s.status == StepStatus::NotRun);

        if never_started && row.error.is_none() {
            skipped += 1;
            cases.push_str(&format!(
                "  <testcase name=\"{}\" classname=\"replay-engine\">\n    <skipped message=\"run cancelled\" />\n  </testcase>\n",
                escape_xml(&name)
            ));
            continue;
        }

        let (message, kind) = match failed {
            Some(step) => (
                format!(
                    "step {} failed at {}",
                    step.step_id,
                    step.stage.as_deref().unwrap_or("execute")
                ),
                step.stage.clone().unwrap_or_else(|| "execute".into()),
            ),
            None if row.error.is_some() => ("row failed".to_string(), "page".to_string()),
            None => ("row cancelled".to_string(), "cancelled".to_string()),
        };
        let body = row
            .error
            .clone()
            .or_else(|| failed.and_then(|s| s.message.clone()))
            .unwrap_or_default();

        cases.push_str(&format!(
            "  <testcase name=\"{name}\" classname=\"replay-engine\" time=\"{time}\">\n    <failure message=\"{message}\" type=\"{kind}\">{body}</failure>\n  </testcase>\n",
            name = escape_xml(&name),
            time = time,
            message = escape_xml(&message),
            kind = escape_xml(&kind),
            body = escape_xml(&body),
        ));
    }

    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<testsuite name=\"{name}\" tests=\"{tests}\" failures=\"{failures}\" skipped=\"{skipped}\" time=\"{time:.3}\">\n{cases}</testsuite>\n",
        name = escape_xml(result.sequence_name().unwrap_or("replay")),
        tests = result.rows().len(),
        failures = result.rows_failed() - skipped,
        skipped = skipped,
        time = result.duration_ms() as f64 / 1000.0,
        cases = cases,
    )
}

/// Escape XML special characters.
pub fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
