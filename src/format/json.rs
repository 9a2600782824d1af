//! JSON output formatter

use crate::error::Result;
use crate::feed::FeedState;
use crate::format::OutputFormatter;

/// JSON formatter - outputs the full feed state as pretty-printed JSON
pub struct JsonFormatter;

impl OutputFormatter for JsonFormatter {
    fn name(&self) -> &str {
        "json"
    }

    fn description(&self) -> &str {
        "Full feed state as JSON"
    }

    fn format(&self, state: &FeedState) -> Result<String> {
        Ok(serde_json::to_string_pretty(state)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::tests::sample_state;

    #[test]
    fn test_json_format() {
        let output = JsonFormatter.format(&sample_state()).unwrap();

        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed["phase"], "live");
        assert_eq!(parsed["location"]["source"], "default_fallback");
        assert_eq!(parsed["listings"][0]["listing"]["id"], "apt");
        assert_eq!(parsed["listings"][0]["listing"]["price_period"], "month");
        assert_eq!(parsed["listings"][1]["distance_km"], 4.87);
        assert!(parsed["error"].is_null());
    }

    #[test]
    fn test_json_formatter_info() {
        assert_eq!(JsonFormatter.name(), "json");
        assert!(!JsonFormatter.description().is_empty());
    }
}
