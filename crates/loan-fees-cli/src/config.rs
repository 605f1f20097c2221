use std::fs;
use std::path::Path;

use loan_fees_core::FeeEngineConfig;

/// Load engine settings. No path means defaults; `.json` files are read as
/// JSON and anything else as YAML.
pub fn load_config(path: Option<&str>) -> Result<FeeEngineConfig, Box<dyn std::error::Error>> {
    let Some(path) = path else {
        return Ok(FeeEngineConfig::default());
    };

    let p = Path::new(path);
    let contents = fs::read_to_string(p)
        .map_err(|e| format!("Failed to read config '{}': {}", p.display(), e))?;

    let is_json = p
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    let config: FeeEngineConfig = if is_json {
        serde_json::from_str(&contents)
            .map_err(|e| format!("Failed to parse config '{}': {}", p.display(), e))?
    } else if contents.trim().is_empty() {
        FeeEngineConfig::default()
    } else {
        serde_yaml::from_str(&contents)
            .map_err(|e| format!("Failed to parse config '{}': {}", p.display(), e))?
    };

    tracing::debug!(?config, "engine configuration loaded");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use loan_fees_core::{Currency, OverlapPolicy};

    #[test]
    fn test_no_path_gives_defaults() {
        assert_eq!(load_config(None).unwrap(), FeeEngineConfig::default());
    }

    #[test]
    fn test_yaml_config() {
        let dir = std::env::temp_dir().join(format!("lfee-config-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("engine.yaml");
        fs::write(
            &path,
            "overlapPolicy: FirstMatch\nrequireFullCoverage: true\ndefaultCurrency: KWD\n",
        )
        .unwrap();

        let config = load_config(path.to_str()).unwrap();
        assert_eq!(config.overlap_policy, OverlapPolicy::FirstMatch);
        assert!(config.require_full_coverage);
        assert_eq!(config.default_currency, Currency::Other("KWD".into()));

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(load_config(Some("/nonexistent/lfee.yaml")).is_err());
    }
}
