use crate::services::sampling_estimator::EstimationResult;
use std::fmt::Write;

pub const NO_PERCENTAGE_WARNING: &str =
    "Couldn't extract any valid percentages from the AI responses.";

/// Plain-text rendering used by the `estimate` command.
pub fn render_report(result: &EstimationResult) -> String {
    let mut report = String::new();
    for (i, output) in result.raw_outputs().iter().enumerate() {
        let _ = writeln!(report, "Run {}: {}", i + 1, output.trim_end());
    }
    report.push('\n');

    match result.average {
        Some(average) => {
            let parsed: Vec<String> = result
                .parsed_percentages
                .iter()
                .map(|p| format!("{}%", p))
                .collect();
            let _ = writeln!(
                report,
                "Parsed percentages: {} ({} of {} runs)",
                parsed.join(", "),
                parsed.len(),
                result.runs.len()
            );
            let _ = writeln!(
                report,
                "Average completion percentage: {}%",
                format_average(average)
            );
        }
        None => {
            let _ = writeln!(report, "{}", NO_PERCENTAGE_WARNING);
        }
    }
    report
}

/// Whole averages keep one decimal place (`70.0`). Others print as stored,
/// which after rounding is at most two decimals.
fn format_average(average: f64) -> String {
    if average.fract() == 0.0 {
        format!("{:.1}", average)
    } else {
        format!("{}", average)
    }
}
