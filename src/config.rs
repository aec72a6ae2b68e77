use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::cli::{ForecastArgs, IoArgs};

/// Config file read when `--config` is not given, if it exists.
pub const DEFAULT_CONFIG_PATH: &str = "nimbus.toml";

/// Top-level Nimbus configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NimbusConfig {
    /// I/O settings.
    #[serde(default)]
    pub io: IoConfig,

    /// Condition classifier settings.
    #[serde(default)]
    pub classifier: ClassifierToml,

    /// Steady-state solver settings.
    #[serde(default)]
    pub steady_state: SteadyStateToml,

    /// Trajectory simulation settings.
    #[serde(default)]
    pub simulation: SimulationToml,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct IoConfig {
    pub input: Option<PathBuf>,
    pub output: Option<PathBuf>,
    #[serde(default)]
    pub allow_date_gaps: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClassifierToml {
    #[serde(default = "default_state")]
    pub default_state: String,
    /// Checked in order; the first keyword contained in the description wins.
    #[serde(default = "default_rules")]
    pub rules: Vec<RuleToml>,
    #[serde(default = "default_state_order")]
    pub state_order: String,
}

impl Default for ClassifierToml {
    fn default() -> Self {
        Self {
            default_state: default_state(),
            rules: default_rules(),
            state_order: default_state_order(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleToml {
    pub keyword: String,
    pub state: String,
}

fn default_state() -> String {
    "Sunny".to_string()
}
fn default_rules() -> Vec<RuleToml> {
    vec![
        RuleToml {
            keyword: "rain".to_string(),
            state: "Rainy".to_string(),
        },
        RuleToml {
            keyword: "cloud".to_string(),
            state: "Cloudy".to_string(),
        },
    ]
}
fn default_state_order() -> String {
    "first_seen".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SteadyStateToml {
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    #[serde(default = "default_fallback")]
    pub fallback: String,
}

impl Default for SteadyStateToml {
    fn default() -> Self {
        Self {
            tolerance: default_tolerance(),
            max_iterations: default_max_iterations(),
            fallback: default_fallback(),
        }
    }
}

fn default_tolerance() -> f64 {
    1e-9
}
fn default_max_iterations() -> usize {
    10_000
}
fn default_fallback() -> String {
    "error".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimulationToml {
    #[serde(default = "default_days")]
    pub days: usize,
    #[serde(default)]
    pub initial_state: Option<String>,
    #[serde(default)]
    pub seed: Option<u64>,
    /// Day-0 timestamp in epoch milliseconds; current time if unset.
    #[serde(default)]
    pub start_ms: Option<i64>,
    #[serde(default = "default_max_days")]
    pub max_days: usize,
}

impl Default for SimulationToml {
    fn default() -> Self {
        Self {
            days: default_days(),
            initial_state: None,
            seed: None,
            start_ms: None,
            max_days: default_max_days(),
        }
    }
}

fn default_days() -> usize {
    7
}
fn default_max_days() -> usize {
    365
}

impl NimbusConfig {
    /// Reads and parses a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let toml_str = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        toml::from_str(&toml_str)
            .with_context(|| format!("failed to parse TOML config: {}", path.display()))
    }

    /// Loads the config named on the command line, else `nimbus.toml` in the
    /// working directory if present, else built-in defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => {
                let fallback = Path::new(DEFAULT_CONFIG_PATH);
                if fallback.exists() {
                    Self::from_file(fallback)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Applies `--input` / `--output`.
    pub fn apply_io_overrides(&mut self, args: &IoArgs) {
        if let Some(ref p) = args.input {
            self.io.input = Some(p.clone());
        }
        if let Some(ref p) = args.output {
            self.io.output = Some(p.clone());
        }
    }

    /// Applies `--days` / `--initial-state` / `--seed`.
    pub fn apply_forecast_overrides(&mut self, args: &ForecastArgs) {
        if let Some(d) = args.days {
            self.simulation.days = d;
        }
        if let Some(ref s) = args.initial_state {
            self.simulation.initial_state = Some(s.clone());
        }
        if let Some(s) = args.seed {
            self.simulation.seed = Some(s);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let cfg: NimbusConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.classifier.default_state, "Sunny");
        assert_eq!(cfg.classifier.rules.len(), 2);
        assert_eq!(cfg.classifier.rules[0].keyword, "rain");
        assert_eq!(cfg.steady_state.tolerance, 1e-9);
        assert_eq!(cfg.steady_state.max_iterations, 10_000);
        assert_eq!(cfg.steady_state.fallback, "error");
        assert_eq!(cfg.simulation.days, 7);
        assert_eq!(cfg.simulation.max_days, 365);
        assert!(!cfg.io.allow_date_gaps);
    }

    #[test]
    fn full_file() {
        let cfg: NimbusConfig = toml::from_str(
            r#"
            [io]
            input = "history.json"
            allow_date_gaps = true

            [classifier]
            default_state = "Clear"
            state_order = "declared"
            rules = [
                { keyword = "snow", state = "Snowy" },
                { keyword = "rain", state = "Rainy" },
            ]

            [steady_state]
            fallback = "last_iterate"

            [simulation]
            days = 30
            initial_state = "Rainy"
            seed = 7
            "#,
        )
        .unwrap();
        assert_eq!(cfg.io.input, Some(PathBuf::from("history.json")));
        assert!(cfg.io.allow_date_gaps);
        assert_eq!(cfg.classifier.rules[0].state, "Snowy");
        assert_eq!(cfg.classifier.state_order, "declared");
        assert_eq!(cfg.steady_state.fallback, "last_iterate");
        assert_eq!(cfg.simulation.initial_state.as_deref(), Some("Rainy"));
        assert_eq!(cfg.simulation.seed, Some(7));
    }

    #[test]
    fn unknown_field_rejected() {
        let r: Result<NimbusConfig, _> = toml::from_str("[simulation]\nhorizon = 3\n");
        assert!(r.is_err());
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nimbus.toml");
        std::fs::write(&path, "[simulation]\ndays = 12\n").unwrap();
        let cfg = NimbusConfig::load(Some(&path)).unwrap();
        assert_eq!(cfg.simulation.days, 12);

        let missing = dir.path().join("missing.toml");
        let err = NimbusConfig::load(Some(&missing)).unwrap_err();
        assert!(format!("{err:#}").contains("failed to read config file"));
    }

    #[test]
    fn cli_overrides_file() {
        let mut cfg: NimbusConfig =
            toml::from_str("[simulation]\ndays = 3\nseed = 1\n").unwrap();
        cfg.apply_forecast_overrides(&ForecastArgs {
            days: Some(10),
            initial_state: Some("Cloudy".to_string()),
            seed: None,
        });
        cfg.apply_io_overrides(&IoArgs {
            config: None,
            input: None,
            output: Some(PathBuf::from("out.json")),
        });
        assert_eq!(cfg.simulation.days, 10);
        assert_eq!(cfg.simulation.seed, Some(1));
        assert_eq!(cfg.simulation.initial_state.as_deref(), Some("Cloudy"));
        assert_eq!(cfg.io.output, Some(PathBuf::from("out.json")));
    }
}
