use serde::{Deserialize, Serialize};

use crate::bands::OverlapPolicy;
use crate::types::Currency;

/// Engine-wide settings for validating and resolving fee schedules.
///
/// Every field has a default, so an empty document (`{}`) is a valid
/// configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FeeEngineConfig {
    pub overlap_policy: OverlapPolicy,
    /// Reject band schedules with holes between their lowest and highest edge
    pub require_full_coverage: bool,
    /// Currency used for labels and rounding when a loan context names none
    pub default_currency: Currency,
}

impl FeeEngineConfig {
    /// Settings for schedules captured before overlap checks existed.
    pub fn legacy() -> Self {
        FeeEngineConfig {
            overlap_policy: OverlapPolicy::FirstMatch,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_yields_defaults() {
        let config: FeeEngineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, FeeEngineConfig::default());
        assert_eq!(config.overlap_policy, OverlapPolicy::Reject);
        assert!(!config.require_full_coverage);
        assert_eq!(config.default_currency, Currency::USD);
    }

    #[test]
    fn test_partial_document() {
        let config: FeeEngineConfig =
            serde_json::from_str(r#"{"overlapPolicy":"FirstMatch","defaultCurrency":"XAF"}"#)
                .unwrap();
        assert_eq!(config.overlap_policy, OverlapPolicy::FirstMatch);
        assert_eq!(config.default_currency, Currency::Other("XAF".into()));
    }
}
