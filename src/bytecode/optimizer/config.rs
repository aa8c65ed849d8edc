//! Optimizer configuration
//!
//! The numeric optimization level is a monotonic feature gate. Which level
//! enables which pass group is configurable, as is the iteration cap of the
//! driver and a list of passes to switch off entirely.
//!
//! ## TOML Format
//!
//! ```toml
//! peephole_level = 1
//! tail_merge_level = 2
//! max_iterations = 1000
//! disabled_passes = ["dead_store_at_exit"]
//! ```

use std::fmt;
use std::path::Path;

use serde::Deserialize;

use super::types::Pass;

/// Default iteration cap of the pass driver
pub const DEFAULT_MAX_ITERATIONS: usize = 1000;

/// Errors from loading or validating a configuration
#[derive(Debug)]
pub enum ConfigError {
    /// The file could not be read
    Io(std::io::Error),
    /// The content is not valid TOML for this configuration
    Parse(toml::de::Error),
    /// The iteration cap is zero
    ZeroIterations,
    /// Level gates are inconsistent
    InvalidLevels { peephole: u8, tail_merge: u8 },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "Failed to read optimizer configuration: {}", e),
            Self::Parse(e) => write!(f, "Invalid optimizer configuration: {}", e),
            Self::ZeroIterations => write!(f, "max_iterations must be at least 1"),
            Self::InvalidLevels {
                peephole,
                tail_merge,
            } => write!(
                f,
                "Invalid level gates: peephole_level = {}, tail_merge_level = {} \
                 (need 1 <= peephole_level <= tail_merge_level)",
                peephole, tail_merge
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Parse(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        Self::Parse(e)
    }
}

/// Result type for configuration loading
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Optimizer configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OptimizerConfig {
    /// Lowest level that enables the local pattern set
    pub peephole_level: u8,
    /// Lowest level that additionally enables tail merging
    pub tail_merge_level: u8,
    /// Maximum number of driver rounds
    pub max_iterations: usize,
    /// Passes that never run
    pub disabled_passes: Vec<Pass>,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            peephole_level: 1,
            tail_merge_level: 2,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            disabled_passes: Vec::new(),
        }
    }
}

impl OptimizerConfig {
    /// Parse and validate a configuration from TOML content.
    pub fn parse_toml(content: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a TOML file path.
    pub fn load_from_toml_path(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse_toml(&content)
    }

    /// Check the level gates and iteration cap
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_iterations == 0 {
            return Err(ConfigError::ZeroIterations);
        }
        if self.peephole_level == 0 || self.tail_merge_level < self.peephole_level {
            return Err(ConfigError::InvalidLevels {
                peephole: self.peephole_level,
                tail_merge: self.tail_merge_level,
            });
        }
        Ok(())
    }

    /// Builder-style: switch off a pass
    pub fn without(mut self, pass: Pass) -> Self {
        if !self.disabled_passes.contains(&pass) {
            self.disabled_passes.push(pass);
        }
        self
    }

    /// Builder-style: enable exactly one pass
    pub fn only(pass: Pass) -> Self {
        Self {
            disabled_passes: Pass::ALL.iter().copied().filter(|&p| p != pass).collect(),
            ..Self::default()
        }
    }

    /// Whether `pass` runs at `level`
    pub fn is_enabled(&self, pass: Pass, level: u8) -> bool {
        if self.disabled_passes.contains(&pass) {
            return false;
        }
        let gate = if pass.is_tail_merge() {
            self.tail_merge_level
        } else {
            self.peephole_level
        };
        level >= gate
    }

    /// Passes that run at `level`, in execution order
    pub fn passes_for_level(&self, level: u8) -> Vec<Pass> {
        Pass::ALL
            .iter()
            .copied()
            .filter(|&pass| self.is_enabled(pass, level))
            .collect()
    }
}

/// Everything an optimizer run may consult besides the procedure itself
#[derive(Debug, Clone, Default)]
pub struct OptimizerContext {
    config: OptimizerConfig,
}

impl OptimizerContext {
    pub fn new(config: OptimizerConfig) -> Self {
        Self { config }
    }

    #[inline]
    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }
}
