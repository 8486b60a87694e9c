//! Screenplay document and persistence.
//!
//! A screenplay is the top-level authored timeline: global canvas/audio
//! settings plus ordered scenes. It is stored as a single JSON file.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use storyline_common::config::RenderDefaults;

use crate::scene::SceneScript;

/// Top-level screenplay file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Screenplay {
    /// Schema version.
    #[serde(default = "default_version")]
    pub version: String,

    /// Human-readable title.
    pub name: String,

    /// Creation timestamp (ISO 8601).
    #[serde(default)]
    pub created_at: String,

    #[serde(default)]
    pub config: ScreenplayConfig,

    pub scenes: Vec<SceneScript>,
}

/// Canvas and audio settings shared by every scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenplayConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,

    /// Canvas clear color as hex string (for example `#101018`).
    pub background: String,

    /// Output audio sample rate.
    pub sample_rate: u32,

    /// Output audio channel count.
    pub channels: u16,
}

impl Default for ScreenplayConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            fps: 30,
            background: "#000000".to_string(),
            sample_rate: 48000,
            channels: 2,
        }
    }
}

impl ScreenplayConfig {
    /// Canvas and audio settings taken from the application render defaults.
    pub fn from_defaults(defaults: &RenderDefaults) -> Self {
        Self {
            width: defaults.width,
            height: defaults.height,
            fps: defaults.fps,
            sample_rate: defaults.sample_rate,
            channels: defaults.channels,
            ..Self::default()
        }
    }
}

impl Screenplay {
    /// Create an empty screenplay.
    pub fn new(name: impl Into<String>, config: ScreenplayConfig) -> Self {
        Self {
            version: default_version(),
            name: name.into(),
            created_at: chrono::Utc::now().to_rfc3339(),
            config,
            scenes: vec![],
        }
    }

    /// Builder: append a scene.
    pub fn scene(mut self, scene: SceneScript) -> Self {
        self.scenes.push(scene);
        self
    }

    /// Load a screenplay from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ScreenplayError> {
        let path = path.as_ref().to_path_buf();
        let json = std::fs::read_to_string(&path).map_err(|e| ScreenplayError::IoError {
            path: path.clone(),
            source: e,
        })?;
        serde_json::from_str(&json).map_err(|e| ScreenplayError::ParseError { path, source: e })
    }

    /// Load a screenplay, taking every `config` field the file leaves out
    /// from `defaults` instead of the built-in values.
    pub fn load_with_defaults(
        path: impl AsRef<Path>,
        defaults: &RenderDefaults,
    ) -> Result<Self, ScreenplayError> {
        let path = path.as_ref().to_path_buf();
        let json = std::fs::read_to_string(&path).map_err(|e| ScreenplayError::IoError {
            path: path.clone(),
            source: e,
        })?;
        let parse_error = |source: serde_json::Error| ScreenplayError::ParseError {
            path: path.clone(),
            source,
        };

        let mut doc: serde_json::Value = serde_json::from_str(&json).map_err(parse_error)?;
        let base = serde_json::to_value(ScreenplayConfig::from_defaults(defaults))
            .map_err(parse_error)?;
        if let (Some(doc), serde_json::Value::Object(base)) = (doc.as_object_mut(), base) {
            let config = doc
                .entry("config")
                .or_insert_with(|| serde_json::Value::Object(serde_json::Map::new()));
            if let Some(config) = config.as_object_mut() {
                for (key, fallback) in base {
                    config.entry(key).or_insert(fallback);
                }
            }
        }
        serde_json::from_value(doc).map_err(parse_error)
    }

    /// Save the screenplay as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ScreenplayError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| ScreenplayError::IoError {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
            }
        }
        let json = serde_json::to_string_pretty(self).map_err(|e| ScreenplayError::ParseError {
            path: path.clone(),
            source: e,
        })?;
        std::fs::write(&path, json).map_err(|e| ScreenplayError::IoError { path, source: e })
    }

    /// Structural checks that do not need assets. Returns one line per issue.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = vec![];

        if self.config.fps == 0 {
            issues.push("fps must be greater than zero".to_string());
        }
        if self.config.width == 0 || self.config.height == 0 {
            issues.push(format!(
                "canvas must be non-empty (got {}x{})",
                self.config.width, self.config.height
            ));
        }
        if self.config.sample_rate == 0 || self.config.channels == 0 {
            issues.push("audio sample rate and channel count must be non-zero".to_string());
        }
        if self.scenes.is_empty() {
            issues.push("screenplay has no scenes".to_string());
        }

        for scene in &self.scenes {
            let mut seen = HashSet::new();
            for node in scene.root.walk() {
                if !seen.insert(node.name.as_str()) {
                    issues.push(format!(
                        "scene '{}': duplicate node name '{}'",
                        scene.name, node.name
                    ));
                }
            }
            if scene.defaults.end_interval_secs < 0.0 {
                issues.push(format!(
                    "scene '{}': end interval must not be negative",
                    scene.name
                ));
            }
        }

        issues
    }

    /// Total number of directives across all scenes.
    pub fn directive_count(&self) -> usize {
        self.scenes.iter().map(|s| s.directives.len()).sum()
    }
}

/// Errors that can occur when reading or writing screenplays.
#[derive(Debug, thiserror::Error)]
pub enum ScreenplayError {
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Parse error in {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid screenplay: {message}")]
    ValidationError { message: String },
}

impl From<ScreenplayError> for storyline_common::StorylineError {
    fn from(err: ScreenplayError) -> Self {
        match err {
            ScreenplayError::IoError { path, source }
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                storyline_common::StorylineError::FileNotFound { path }
            }
            other => storyline_common::StorylineError::screenplay(other.to_string()),
        }
    }
}

fn default_version() -> String {
    "1.0".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directive::{DirectiveConfig, DirectiveOp};
    use crate::scene::NodeConfig;

    fn sample() -> Screenplay {
        Screenplay::new("Demo", ScreenplayConfig::default()).scene(
            SceneScript::new(
                "intro",
                NodeConfig::container("root").child(NodeConfig::text("line")),
            )
            .directive(DirectiveConfig::new(DirectiveOp::Wait { duration: 1.0 })),
        )
    }

    #[test]
    fn test_screenplay_creation() {
        let play = sample();
        assert_eq!(play.version, "1.0");
        assert_eq!(play.config.fps, 30);
        assert_eq!(play.directive_count(), 1);
        assert!(play.validate().is_empty());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("play.json");

        let play = sample();
        play.save(&path).unwrap();

        let loaded = Screenplay::load(&path).unwrap();
        assert_eq!(loaded, play);
    }

    #[test]
    fn test_load_missing_file_maps_to_file_not_found() {
        let err = Screenplay::load("/definitely/not/here.json").unwrap_err();
        let err: storyline_common::StorylineError = err.into();
        assert!(matches!(
            err,
            storyline_common::StorylineError::FileNotFound { .. }
        ));
    }

    #[test]
    fn test_validate_reports_duplicates_and_empty() {
        let mut play = Screenplay::new("Broken", ScreenplayConfig::default());
        assert!(play
            .validate()
            .iter()
            .any(|issue| issue.contains("no scenes")));

        play.config.fps = 0;
        play.scenes.push(SceneScript::new(
            "dupes",
            NodeConfig::container("root")
                .child(NodeConfig::text("a"))
                .child(NodeConfig::text("a")),
        ));
        let issues = play.validate();
        assert!(issues.iter().any(|i| i.contains("fps")));
        assert!(issues.iter().any(|i| i.contains("duplicate node name 'a'")));
    }

    #[test]
    fn test_minimal_json_uses_config_defaults() {
        let json = r#"{
            "name": "Tiny",
            "scenes": [
                { "name": "only", "root": { "name": "root", "type": "container" } }
            ]
        }"#;
        let play: Screenplay = serde_json::from_str(json).unwrap();
        assert_eq!(play.config, ScreenplayConfig::default());
        assert!(play.scenes[0].directives.is_empty());
    }

    #[test]
    fn test_render_defaults_fill_missing_config_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.json");
        std::fs::write(
            &path,
            r##"{
                "name": "Partial",
                "config": { "width": 320, "background": "#112233" },
                "scenes": [
                    { "name": "only", "root": { "name": "root", "type": "container" } }
                ]
            }"##,
        )
        .unwrap();
        let defaults = RenderDefaults {
            fps: 24,
            width: 640,
            height: 480,
            sample_rate: 22050,
            channels: 1,
            ..RenderDefaults::default()
        };

        let play = Screenplay::load_with_defaults(&path, &defaults).unwrap();
        assert_eq!(play.config.width, 320);
        assert_eq!(play.config.background, "#112233");
        assert_eq!(play.config.height, 480);
        assert_eq!(play.config.fps, 24);
        assert_eq!(play.config.sample_rate, 22050);
        assert_eq!(play.config.channels, 1);

        // Plain `load` keeps the built-in values.
        assert_eq!(Screenplay::load(&path).unwrap().config.fps, 30);
    }

    #[test]
    fn test_render_defaults_apply_without_config_block() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bare.json");
        std::fs::write(
            &path,
            r#"{ "name": "Bare", "scenes": [] }"#,
        )
        .unwrap();
        let defaults = RenderDefaults {
            fps: 60,
            ..RenderDefaults::default()
        };

        let play = Screenplay::load_with_defaults(&path, &defaults).unwrap();
        assert_eq!(play.config, ScreenplayConfig::from_defaults(&defaults));
        assert_eq!(play.config.fps, 60);
    }
}
