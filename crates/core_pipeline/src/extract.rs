//! Report extraction from free-form model output

use crate::prompt::REPORT_MARKER;
use serde::{Deserialize, Serialize};

/// Opening delimiter of a report block
pub const REPORT_OPEN: &str = "<report>";

/// Closing delimiter of a report block
pub const REPORT_CLOSE: &str = "</report>";

/// How the report is located in the model's response
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMode {
    /// Cut everything before the first `### 1.` heading
    #[default]
    Marker,
    /// Ask for a `<report>...</report>` block and parse it, falling back to
    /// `Marker` when the model ignores the instruction
    Delimited,
}

/// Locate the report in a model response.
///
/// Never fails: when nothing matches, the full response is the report.
pub fn extract_report(response: &str, mode: ExtractionMode) -> &str {
    if mode == ExtractionMode::Delimited {
        if let Some(block) = delimited_block(response) {
            return block;
        }
    }

    match response.find(REPORT_MARKER) {
        Some(start) => &response[start..],
        None => response,
    }
}

fn delimited_block(response: &str) -> Option<&str> {
    let open = response.find(REPORT_OPEN)?;
    let body_start = open + REPORT_OPEN.len();
    let close = response[body_start..].find(REPORT_CLOSE)?;
    let block = response[body_start..body_start + close].trim();
    (!block.is_empty()).then_some(block)
}
