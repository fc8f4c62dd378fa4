//! Shared report printing for `kiln run` and `kiln release`.

use crate::executor::RunReport;
use crate::graph::TaskState;

/// Print one line per task to stderr, then tool output of failed tasks.
///
/// When `verbose` is true, diagnostics of successful tasks are printed too.
pub fn print_report(report: &RunReport, verbose: bool) {
    for outcome in &report.outcomes {
        let label = match outcome.state {
            TaskState::Succeeded => "Finished",
            TaskState::Failed => "Failed",
            TaskState::Skipped => "Skipped",
            TaskState::Pending | TaskState::Running => "Not run",
        };
        match &outcome.cause {
            Some(cause) => eprintln!("{label:>12} {} ({cause})", outcome.name),
            None => eprintln!(
                "{label:>12} {} in {:.2}s",
                outcome.name,
                std::time::Duration::from_millis(outcome.duration_ms).as_secs_f64()
            ),
        }

        let show = outcome.state == TaskState::Failed || verbose;
        if let Some(diagnostic) = outcome.diagnostic.as_deref().filter(|_| show) {
            for line in diagnostic.lines() {
                eprintln!("             | {line}");
            }
        }
    }
}

/// One-line summary, e.g. `"3 succeeded, 1 failed, 2 skipped"`.
pub fn summary(report: &RunReport) -> String {
    let mut parts = vec![format!("{} succeeded", report.count(TaskState::Succeeded))];
    for (state, label) in [
        (TaskState::Failed, "failed"),
        (TaskState::Skipped, "skipped"),
        (TaskState::Pending, "not run"),
    ] {
        let count = report.count(state);
        if count > 0 {
            parts.push(format!("{count} {label}"));
        }
    }
    parts.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::TaskOutcome;

    fn outcome(name: &str, state: TaskState) -> TaskOutcome {
        TaskOutcome {
            name: name.to_owned(),
            state,
            duration_ms: 5,
            diagnostic: None,
            cause: None,
            product: None,
        }
    }

    #[test]
    fn summary_lists_non_zero_counts() {
        let report = RunReport {
            outcomes: vec![
                outcome("compileJava", TaskState::Succeeded),
                outcome("checkstyleMain", TaskState::Failed),
                outcome("jar", TaskState::Skipped),
                outcome("javadoc", TaskState::Succeeded),
            ],
        };
        assert_eq!(summary(&report), "2 succeeded, 1 failed, 1 skipped");
    }

    #[test]
    fn summary_of_clean_run() {
        let report = RunReport {
            outcomes: vec![outcome("jar", TaskState::Succeeded)],
        };
        assert_eq!(summary(&report), "1 succeeded");
    }
}
