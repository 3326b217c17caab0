//! Per-tracking-code delivery estimate results

use chrono::NaiveDate;

/// Placeholder token for a lookup that found no estimate
pub const NO_DATA_TOKEN: &str = "No data";

/// Result of one carrier lookup for one tracking code
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EstimateResult {
    /// Estimated (or actual) delivery date
    Date(NaiveDate),
    /// Delivery date plus the package count reported by the carrier
    DateWithCount(NaiveDate, u32),
    /// Carrier answered but carried no usable estimate
    NoData,
    /// Lookup failed; the message is rendered into the estimate token
    Error(String),
}

impl EstimateResult {
    /// Render the estimate token for this result
    ///
    /// Error messages have the `;` and `|` delimiters replaced so a single
    /// token can never split into two on re-parse.
    pub fn to_token(&self) -> String {
        match self {
            EstimateResult::Date(date) => date.format("%Y-%m-%d").to_string(),
            EstimateResult::DateWithCount(date, count) => {
                format!("{} [{}]", date.format("%Y-%m-%d"), count)
            }
            EstimateResult::NoData => NO_DATA_TOKEN.to_string(),
            EstimateResult::Error(message) => {
                format!("Error: {}", message.replace([';', '|'], ","))
            }
        }
    }
}

impl std::fmt::Display for EstimateResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_token())
    }
}
