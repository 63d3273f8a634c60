use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::planner::{PlanConfig, TimingConfig, TuningConfig};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log_level: Option<String>,
    pub scheduler: SchedulerConfig,
    pub extraction: ExtractionConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Milliseconds between driver ticks
    pub tick_interval_ms: u64,
    /// How many targets may be prepping/targeting at once
    pub max_busy_targets: usize,
    /// Cap on cycles in flight per attack batch
    pub max_cycles_per_batch: u32,
    /// Head start before a cold-started group's first job
    pub initial_delay_ms: i64,
    /// Gap between adjacent job landings
    pub job_delay_ms: i64,
    /// Extra gap between chained cycles
    pub cycle_spacing_ms: i64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 2000,
            max_busy_targets: 30,
            max_cycles_per_batch: 50,
            initial_delay_ms: 3000,
            job_delay_ms: 1000,
            cycle_spacing_ms: 3000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Fraction a fresh target starts at before any tuning
    pub default_fraction: f64,
    /// Tuning grid floor
    pub min_fraction: f64,
    /// Tuning grid ceiling
    pub max_fraction: f64,
    /// Tuning grid step
    pub fraction_step: f64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            default_fraction: 0.1,
            min_fraction: 0.01,
            max_fraction: 0.95,
            fraction_step: 0.01,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Where the live batch set is persisted
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("reapr"),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: Some("info".to_string()),
            scheduler: SchedulerConfig::default(),
            extraction: ExtractionConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try primary location: ~/.config/<project>/<project>.yml
        if let Some(config_dir) = dirs::config_dir() {
            let project_name = env!("CARGO_PKG_NAME");
            let primary_config = config_dir.join(project_name).join(format!("{}.yml", project_name));
            if primary_config.exists() {
                match Self::load_from_file(&primary_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from {}: {}", primary_config.display(), e);
                    }
                }
            }
        }

        // Try fallback location: ./<project>.yml
        let project_name = env!("CARGO_PKG_NAME");
        let fallback_config = PathBuf::from(format!("{}.yml", project_name));
        if fallback_config.exists() {
            match Self::load_from_file(&fallback_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    log::warn!("Failed to load config from {}: {}", fallback_config.display(), e);
                }
            }
        }

        // No config file found, use defaults
        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// The assembler's view of the scheduler knobs
    pub fn plan_config(&self) -> PlanConfig {
        PlanConfig {
            timing: TimingConfig {
                initial_delay_ms: self.scheduler.initial_delay_ms,
                job_delay_ms: self.scheduler.job_delay_ms,
                cycle_spacing_ms: self.scheduler.cycle_spacing_ms,
            },
            max_cycles_per_batch: self.scheduler.max_cycles_per_batch,
        }
    }

    /// The tuner's view of the extraction grid
    pub fn tuning_config(&self) -> TuningConfig {
        TuningConfig {
            min_fraction: self.extraction.min_fraction,
            max_fraction: self.extraction.max_fraction,
            fraction_step: self.extraction.fraction_step,
        }
    }
}
