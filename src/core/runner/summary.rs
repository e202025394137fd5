//! Summary extraction from final agent messages.
//!
//! Batch reports surface a compact per-task summary when the agent message
//! carries the canonical headers `Did:`, `Files:`, `Tests:`, `Coverage:`.
//! Matching is case-insensitive and whitespace tolerant; values are kept
//! verbatim. A coverage percentage below 90 is flagged.

use crate::core::parallel::TaskSummary;
use once_cell::sync::Lazy;
use regex::Regex;

static DID: Lazy<Regex> = Lazy::new(|| header_regex("did"));
static FILES: Lazy<Regex> = Lazy::new(|| header_regex("files"));
static TESTS: Lazy<Regex> = Lazy::new(|| header_regex("tests"));
static COVERAGE: Lazy<Regex> = Lazy::new(|| header_regex("coverage"));
static PERCENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+(?:\.\d+)?)\s*%?").expect("static regex must compile"));

fn header_regex(name: &str) -> Regex {
    // horizontal whitespace only: an empty header value must not capture
    // the following line
    Regex::new(&format!(r"(?im)^[ \t]*{}[ \t]*:[ \t]*(.*?)[ \t]*$", name))
        .expect("static regex must compile")
}

/// Coverage below this percentage gets flagged in the report.
pub const COVERAGE_THRESHOLD: f64 = 90.0;

/// Extract the summary headers from an agent message.
///
/// Returns `None` when no header is present at all.
pub fn extract(message: &str) -> Option<TaskSummary> {
    let capture = |re: &Regex| -> String {
        re.captures(message)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .unwrap_or_default()
    };

    let summary = TaskSummary {
        did: capture(&DID),
        files: capture(&FILES),
        tests: capture(&TESTS),
        coverage: capture(&COVERAGE),
        coverage_below_threshold: false,
    };

    if summary.did.is_empty()
        && summary.files.is_empty()
        && summary.tests.is_empty()
        && summary.coverage.is_empty()
    {
        return None;
    }

    let below = PERCENT
        .captures(&summary.coverage)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .map(|p| p < COVERAGE_THRESHOLD)
        .unwrap_or(false);

    Some(TaskSummary {
        coverage_below_threshold: below,
        ..summary
    })
}
