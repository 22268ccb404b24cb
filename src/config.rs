//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Global config: `$XDG_CONFIG_HOME/skilltree/skilltree.toml`
//! 3. Local config: file given with `--config`
//! 4. Environment variables: `SKILLTREE_*` prefix

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::application::ApplicationError;
use crate::domain::colors::{default_partition_colors, validate_hex, DEFAULT_PARTITION_COLOR};
use crate::domain::{vanilla_theme_hints, BuildConfig, BuilderKind};

const APP_NAME: &str = "skilltree";

/// Raw settings for intermediate parsing (fields are Option to detect "not specified").
///
/// `build` stays an untyped table so a layer can override single keys.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawSettings {
    pub build: Option<toml::Table>,
    pub builder: Option<BuilderKind>,
    pub theme_hints: Option<BTreeMap<String, Vec<String>>>,
    pub partition_colors: Option<BTreeMap<String, String>>,
    pub output_dir: Option<PathBuf>,
}

/// Unified configuration for skilltree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Builder selected when the command line does not name one
    pub builder: BuilderKind,
    /// Directory for written trees
    pub output_dir: PathBuf,
    /// Heuristic knobs handed to the builders
    pub build: BuildConfig,
    /// Curated theme hints per partition
    pub theme_hints: BTreeMap<String, Vec<String>>,
    /// Base color per partition
    pub partition_colors: BTreeMap<String, String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            builder: BuilderKind::default(),
            output_dir: PathBuf::from("."),
            build: BuildConfig::default(),
            theme_hints: vanilla_theme_hints(),
            partition_colors: default_partition_colors(),
        }
    }
}

/// Get the XDG config directory for skilltree.
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join(format!("{}.toml", APP_NAME)))
}

/// Load a TOML file into RawSettings for manual merging.
fn load_raw_settings(path: &Path) -> Result<RawSettings, ApplicationError> {
    let content = std::fs::read_to_string(path).map_err(|e| ApplicationError::Config {
        message: format!("read {}: {}", path.display(), e),
    })?;
    toml::from_str(&content).map_err(|e| ApplicationError::Config {
        message: format!("parse {}: {}", path.display(), e),
    })
}

/// `maxChildrenPerNode` → `max_children_per_node`.
fn snake_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for c in key.chars() {
        if c.is_ascii_uppercase() {
            out.push('_');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Override single keys of a build config with a TOML table.
fn overlay_build(base: &BuildConfig, overlay: &toml::Table) -> Result<BuildConfig, ApplicationError> {
    let toml::Value::Table(mut table) =
        toml::Value::try_from(base).map_err(|e| ApplicationError::Config {
            message: format!("serialize build config: {e}"),
        })?
    else {
        return Err(ApplicationError::Config {
            message: "build config is not a table".into(),
        });
    };
    for (key, value) in overlay {
        table.insert(snake_case(key), value.clone());
    }
    toml::Value::Table(table)
        .try_into()
        .map_err(|e| ApplicationError::Config {
            message: format!("invalid [build] section: {e}"),
        })
}

impl Settings {
    /// Merge arrays with union semantics and negation support.
    ///
    /// - Items from overlay are added to base
    /// - Items prefixed with `!` remove the corresponding item from the result
    /// - Duplicates are de-duplicated
    ///
    /// # Examples
    /// ```ignore
    /// merge_array(&["fire", "frost"], &["rune"])          // → ["fire", "frost", "rune"]
    /// merge_array(&["fire", "frost"], &["!fire", "rune"]) // → ["frost", "rune"]
    /// ```
    pub fn merge_array(base: &[String], overlay: &[String]) -> Vec<String> {
        let mut result: HashSet<String> = base.iter().cloned().collect();

        for pattern in overlay {
            if let Some(negated) = pattern.strip_prefix('!') {
                result.remove(negated);
            } else {
                result.insert(pattern.clone());
            }
        }

        // Convert to sorted Vec for deterministic output
        let mut vec: Vec<String> = result.into_iter().collect();
        vec.sort();
        vec
    }

    /// Base color of a partition, falling back to the neutral default.
    pub fn partition_color(&self, partition: &str) -> String {
        self.partition_colors
            .get(partition)
            .cloned()
            .unwrap_or_else(|| DEFAULT_PARTITION_COLOR.to_string())
    }

    /// Theme hints of a partition, if any.
    pub fn hints_for(&self, partition: &str) -> Option<&Vec<String>> {
        self.theme_hints.get(partition)
    }

    /// Expand shell variables and tilde in path-like fields.
    ///
    /// Handles `~`, `$VAR`, and `${VAR}` syntax.
    fn expand_paths(&mut self) {
        let raw = self.output_dir.to_string_lossy().to_string();
        if let Ok(expanded) = shellexpand::full(&raw) {
            self.output_dir = PathBuf::from(expanded.as_ref());
        }
    }

    /// Reject unusable values.
    fn check(&self) -> Result<(), ApplicationError> {
        for (partition, color) in &self.partition_colors {
            validate_hex(color).map_err(|e| ApplicationError::Config {
                message: format!("partition_colors.{}: {}", partition, e),
            })?;
        }
        if self.build.max_children_per_node == 0 {
            return Err(ApplicationError::Config {
                message: "build.max_children_per_node must be at least 1".into(),
            });
        }
        Ok(())
    }

    /// Merge overlay config onto self (base) with union semantics for hint arrays.
    ///
    /// - Scalar options: overlay wins if Some, otherwise keep base
    /// - Build keys: overlay keys replace base keys
    /// - Theme hints: union merge per partition with negation support
    /// - Colors: per partition, overlay wins
    fn merge_with(&self, overlay: &RawSettings) -> Result<Self, ApplicationError> {
        let mut theme_hints = self.theme_hints.clone();
        if let Some(hints) = &overlay.theme_hints {
            for (partition, terms) in hints {
                let base = theme_hints.get(partition).cloned().unwrap_or_default();
                theme_hints.insert(partition.clone(), Self::merge_array(&base, terms));
            }
        }
        let mut partition_colors = self.partition_colors.clone();
        if let Some(colors) = &overlay.partition_colors {
            partition_colors.extend(colors.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        Ok(Self {
            builder: overlay.builder.unwrap_or(self.builder),
            output_dir: overlay
                .output_dir
                .clone()
                .unwrap_or_else(|| self.output_dir.clone()),
            build: match &overlay.build {
                Some(table) => overlay_build(&self.build, table)?,
                None => self.build.clone(),
            },
            theme_hints,
            partition_colors,
        })
    }

    /// Apply global config onto defaults with REPLACE semantics for hint arrays.
    ///
    /// Unlike `merge_with()` which uses union semantics, a partition listed
    /// in the global file gets exactly the hints given there.
    fn apply_global(&self, global: &RawSettings) -> Result<Self, ApplicationError> {
        let mut theme_hints = self.theme_hints.clone();
        if let Some(hints) = &global.theme_hints {
            theme_hints.extend(hints.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        let mut partition_colors = self.partition_colors.clone();
        if let Some(colors) = &global.partition_colors {
            partition_colors.extend(colors.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        Ok(Self {
            builder: global.builder.unwrap_or(self.builder),
            output_dir: global
                .output_dir
                .clone()
                .unwrap_or_else(|| self.output_dir.clone()),
            build: match &global.build {
                Some(table) => overlay_build(&self.build, table)?,
                None => self.build.clone(),
            },
            theme_hints,
            partition_colors,
        })
    }

    /// Load settings with layered precedence.
    ///
    /// # Arguments
    /// * `local` - Optional config file given on the command line
    ///
    /// # Precedence (lowest to highest)
    /// 1. Compiled defaults
    /// 2. Global config: `$XDG_CONFIG_HOME/skilltree/skilltree.toml` (hint arrays REPLACE defaults)
    /// 3. Local config (hint arrays UNION with global, `!term` removes)
    /// 4. Environment variables: `SKILLTREE_*` prefix (REPLACES - explicit override)
    pub fn load(local: Option<&Path>) -> Result<Self, ApplicationError> {
        let mut current = Self::default();

        if let Some(global_path) = global_config_path() {
            if global_path.exists() {
                debug!("loading global config {}", global_path.display());
                let raw = load_raw_settings(&global_path)?;
                current = current.apply_global(&raw)?;
            }
        }

        if let Some(local_path) = local {
            if !local_path.exists() {
                return Err(ApplicationError::Config {
                    message: format!("config file not found: {}", local_path.display()),
                });
            }
            debug!("loading local config {}", local_path.display());
            let raw = load_raw_settings(local_path)?;
            current = current.merge_with(&raw)?;
        }

        current = Self::apply_env_overrides(current)?;
        current.expand_paths();
        current.check()?;

        Ok(current)
    }

    /// Apply SKILLTREE_* environment variables as explicit overrides.
    ///
    /// Nested keys use `__`, e.g. `SKILLTREE_BUILD__MAX_CHILDREN_PER_NODE=2`.
    fn apply_env_overrides(mut settings: Self) -> Result<Self, ApplicationError> {
        let builder = Config::builder().add_source(
            Environment::with_prefix("SKILLTREE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .list_separator(","),
        );

        let config = builder.build().map_err(config_err)?;

        if let Ok(val) = config.get_string("builder") {
            settings.builder = val.parse().map_err(|message| ApplicationError::Config {
                message: format!("SKILLTREE_BUILDER: {}", message),
            })?;
        }
        if let Ok(val) = config.get_string("output_dir") {
            settings.output_dir = PathBuf::from(val);
        }
        if let Ok(val) = config.get::<u64>("build.seed") {
            settings.build.seed = val;
        }
        if let Ok(val) = config.get::<usize>("build.max_children_per_node") {
            settings.build.max_children_per_node = val;
        }
        if let Ok(val) = config.get::<usize>("build.top_themes_per_partition") {
            settings.build.top_themes_per_partition = val;
        }
        if let Ok(val) = config.get::<f32>("build.chaos") {
            settings.build.chaos = val;
        }
        if let Ok(val) = config.get::<bool>("build.auto_fix_unreachable") {
            settings.build.auto_fix_unreachable = val;
        }
        if let Ok(val) = config.get::<bool>("build.prefer_vanilla_roots") {
            settings.build.prefer_vanilla_roots = val;
        }

        Ok(settings)
    }

    /// Show the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ApplicationError> {
        toml::to_string_pretty(self).map_err(|e| ApplicationError::Config {
            message: format!("serialize config: {e}"),
        })
    }
}

fn config_err(e: ConfigError) -> ApplicationError {
    ApplicationError::Config {
        message: e.to_string(),
    }
}
