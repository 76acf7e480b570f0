use anyhow::{anyhow, Context, Result};
use std::path::Path;
use tracing::{info, warn};

use super::PipelineConfig;

/// Environment prefix; `MARKET_ML__DATA__SYMBOL=ETHUSDT` overrides `data.symbol`
pub const ENV_PREFIX: &str = "MARKET_ML";

/// Builds the pipeline configuration from defaults, an optional TOML file
/// and `MARKET_ML__SECTION__KEY` environment overrides, in that order.
/// A path that does not exist is skipped with a warning.
pub fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    let mut builder = config::Config::builder();

    if let Some(path) = path {
        if path.exists() {
            info!("Loading configuration from {}", path.display());
        } else {
            warn!("Config file {} not found, using defaults", path.display());
        }
        builder = builder.add_source(config::File::from(path).required(false));
    }

    let settings = builder
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("training.scale_columns"),
        )
        .build()
        .context("Failed to assemble configuration")?;

    let config: PipelineConfig = settings
        .try_deserialize()
        .context("Failed to parse configuration")?;

    config
        .validate()
        .map_err(|errors| anyhow!("Invalid configuration: {}", errors.join("; ")))?;

    Ok(config)
}

/// Writes the default configuration as TOML, creating parent directories
pub fn write_default_config(path: &Path) -> Result<()> {
    let toml = toml::to_string_pretty(&PipelineConfig::default())
        .context("Failed to serialise default configuration")?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, toml)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    info!("Wrote default configuration to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::ClassWeight;
    use crate::types::{HistoryPeriod, TimeFrame};
    use chrono::NaiveDate;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = load_config(Some(&dir.path().join("absent.toml"))).unwrap();

        let defaults = PipelineConfig::default();
        assert_eq!(config.data, defaults.data);
        assert_eq!(config.barrier, defaults.barrier);
        assert_eq!(config.training, defaults.training);
    }

    #[test]
    fn test_partial_file_overrides_sections() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pipeline.toml");
        std::fs::write(
            &path,
            r#"
[data]
symbol = "ETHUSDT"
interval = "4h"
start_date = "2023-03-01"
period = "6mo"

[barrier]
take_profit_pct = 0.02
horizon = 8

[model]
class_weight = "uniform"
max_features = 4
"#,
        )
        .unwrap();

        let config = load_config(Some(&path)).unwrap();

        assert_eq!(config.data.symbol, "ETHUSDT");
        assert_eq!(config.data.interval, TimeFrame::H4);
        assert_eq!(config.data.start_date, NaiveDate::from_ymd_opt(2023, 3, 1));
        assert_eq!(config.data.period, HistoryPeriod::Months(6));
        assert_eq!(config.barrier.take_profit_pct, 0.02);
        assert_eq!(config.barrier.stop_loss_pct, 0.01);
        assert_eq!(config.barrier.horizon, 8);
        assert_eq!(config.model.class_weight, ClassWeight::Uniform);
        assert_eq!(config.model.max_features, Some(4));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[training]\ntrain_fraction = 1.5\n").unwrap();

        let err = load_config(Some(&path)).unwrap_err();
        assert!(err.to_string().contains("train_fraction"));
    }

    #[test]
    fn test_environment_override() {
        std::env::set_var("MARKET_ML__ARTIFACTS__MODELS_DIR", "/tmp/env-models");
        let config = load_config(None);
        std::env::remove_var("MARKET_ML__ARTIFACTS__MODELS_DIR");

        assert_eq!(config.unwrap().artifacts.models_dir, "/tmp/env-models");
    }

    #[test]
    fn test_default_config_written_and_reloaded() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("conf").join("pipeline.toml");

        write_default_config(&path).unwrap();
        let config = load_config(Some(&path)).unwrap();

        let defaults = PipelineConfig::default();
        assert_eq!(config.data, defaults.data);
        assert_eq!(config.barrier, defaults.barrier);
        assert_eq!(config.model, defaults.model);
        assert_eq!(config.training, defaults.training);
    }
}
