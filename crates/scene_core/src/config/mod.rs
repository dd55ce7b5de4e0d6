//! Configuration system
//!
//! Scene tuning lives in [`SceneConfig`], which can be loaded from `.toml` or `.ron`
//! files through the [`Config`] trait.

pub use serde::{Serialize, Deserialize};

/// Configuration trait
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Load configuration from file
    fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_str_with_format(&contents, path)
    }

    /// Parse configuration text, picking the format from the file extension in `path`
    fn from_str_with_format(contents: &str, path: &str) -> Result<Self, ConfigError> {
        if path.ends_with(".toml") {
            toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else if path.ends_with(".ron") {
            ron::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else {
            Err(ConfigError::UnsupportedFormat(path.to_string()))
        }
    }

    /// Save configuration to file
    fn save_to_file(&self, path: &str) -> Result<(), ConfigError> {
        let contents = if path.ends_with(".toml") {
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else if path.ends_with(".ron") {
            ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
                .map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else {
            return Err(ConfigError::UnsupportedFormat(path.to_string()));
        };

        std::fs::write(path, contents).map_err(ConfigError::Io)
    }
}

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

/// Tuning knobs for the per-frame scene passes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Computed opacity at or below which a node is treated as hidden for
    /// rendering and hit testing
    pub hidden_opacity_threshold: f32,

    /// Log every node visited by the sort-key generator
    pub debug_sort_order: bool,

    /// Stop triangle iteration at the first hit instead of searching for the
    /// nearest intersection
    pub hit_test_early_exit: bool,

    /// Light-receiving bitmask given to newly created nodes
    pub default_light_receiving_mask: u32,

    /// Shadow-casting bitmask given to newly created nodes
    pub default_shadow_casting_mask: u32,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            hidden_opacity_threshold: 0.02,
            debug_sort_order: false,
            hit_test_early_exit: false,
            default_light_receiving_mask: 1,
            default_shadow_casting_mask: 1,
        }
    }
}

impl Config for SceneConfig {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scene_config_from_toml() {
        let text = "hidden_opacity_threshold = 0.1\ndebug_sort_order = true\n";
        let config = SceneConfig::from_str_with_format(text, "scene.toml").unwrap();
        assert!((config.hidden_opacity_threshold - 0.1).abs() < f32::EPSILON);
        assert!(config.debug_sort_order);
        // Unspecified fields fall back to defaults
        assert_eq!(config.default_light_receiving_mask, 1);
    }

    #[test]
    fn test_scene_config_from_ron() {
        let text = "(hit_test_early_exit: true, default_shadow_casting_mask: 3)";
        let config = SceneConfig::from_str_with_format(text, "scene.ron").unwrap();
        assert!(config.hit_test_early_exit);
        assert_eq!(config.default_shadow_casting_mask, 3);
    }

    #[test]
    fn test_unsupported_format() {
        let result = SceneConfig::from_str_with_format("", "scene.json");
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(_))));
    }
}
