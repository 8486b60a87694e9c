//! Scene scripts and their renderable node trees.

use serde::{Deserialize, Serialize};

use crate::directive::{DirectiveConfig, RevealMode};

/// One scene: a node tree, its script, and defaults for its directives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneScript {
    /// Scene name, used in logs and compile errors.
    pub name: String,

    /// Root of the scene's node tree.
    pub root: NodeConfig,

    /// Ordered script.
    #[serde(default)]
    pub directives: Vec<DirectiveConfig>,

    #[serde(default)]
    pub defaults: SceneDefaults,
}

/// Per-scene defaults applied when directives are instantiated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneDefaults {
    pub speak: SpeakSettings,

    /// Animation directives make their target visible when they fire.
    pub auto_show_targets: bool,

    /// Speak directives make their text node visible when they fire.
    pub auto_show_text: bool,

    /// Extra time appended after the last sequential directive (seconds).
    pub end_interval_secs: f64,
}

/// Reading-speed model for speak directives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeakSettings {
    /// Reading speed in words per minute. CJK characters count as one word each.
    pub wpm: f64,

    pub mode: RevealMode,

    /// Pause appended after each non-empty line (seconds).
    pub line_gap_secs: f64,

    /// Text node that shows the current speaker's name.
    pub speaker_label: Option<String>,
}

impl Default for SceneDefaults {
    fn default() -> Self {
        Self {
            speak: SpeakSettings::default(),
            auto_show_targets: true,
            auto_show_text: true,
            end_interval_secs: 0.0,
        }
    }
}

impl Default for SpeakSettings {
    fn default() -> Self {
        Self {
            wpm: 300.0,
            mode: RevealMode::Typewriter,
            line_gap_secs: 0.5,
            speaker_label: None,
        }
    }
}

/// Authored node of a scene tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Unique (per scene) name that directives target.
    pub name: String,

    #[serde(flatten)]
    pub kind: NodeKind,

    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
    #[serde(default)]
    pub width: f32,
    #[serde(default)]
    pub height: f32,

    #[serde(default = "default_one")]
    pub alpha: f32,
    #[serde(default = "default_one")]
    pub scale: f32,

    #[serde(default = "default_visible")]
    pub visible: bool,

    #[serde(default)]
    pub children: Vec<NodeConfig>,
}

/// What a node draws.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeKind {
    /// Groups children; draws nothing itself.
    Container,

    /// A rectangle filled with `color`, or an image when `source` is set.
    Sprite {
        #[serde(default)]
        color: Option<String>,
        #[serde(default)]
        source: Option<String>,
    },

    Text {
        #[serde(default)]
        content: String,
        #[serde(default = "default_text_color")]
        color: String,
        #[serde(default = "default_font_size")]
        font_size: f32,
    },
}

impl NodeConfig {
    /// A container at the origin with no children.
    pub fn container(name: impl Into<String>) -> Self {
        Self::with_kind(name, NodeKind::Container)
    }

    /// A solid-color sprite.
    pub fn sprite(name: impl Into<String>, color: impl Into<String>) -> Self {
        Self::with_kind(
            name,
            NodeKind::Sprite {
                color: Some(color.into()),
                source: None,
            },
        )
    }

    /// An empty text node.
    pub fn text(name: impl Into<String>) -> Self {
        Self::with_kind(
            name,
            NodeKind::Text {
                content: String::new(),
                color: default_text_color(),
                font_size: default_font_size(),
            },
        )
    }

    fn with_kind(name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            x: 0.0,
            y: 0.0,
            width: 0.0,
            height: 0.0,
            alpha: 1.0,
            scale: 1.0,
            visible: true,
            children: vec![],
        }
    }

    /// Builder: set the node rectangle.
    pub fn at(mut self, x: f32, y: f32, width: f32, height: f32) -> Self {
        self.x = x;
        self.y = y;
        self.width = width;
        self.height = height;
        self
    }

    /// Builder: append a child.
    pub fn child(mut self, child: NodeConfig) -> Self {
        self.children.push(child);
        self
    }

    /// Depth-first iterator over this node and its descendants.
    pub fn walk(&self) -> Vec<&NodeConfig> {
        let mut out = vec![self];
        for child in &self.children {
            out.extend(child.walk());
        }
        out
    }
}

impl SceneScript {
    pub fn new(name: impl Into<String>, root: NodeConfig) -> Self {
        Self {
            name: name.into(),
            root,
            directives: vec![],
            defaults: SceneDefaults::default(),
        }
    }

    /// Builder: append a directive.
    pub fn directive(mut self, directive: DirectiveConfig) -> Self {
        self.directives.push(directive);
        self
    }
}

fn default_one() -> f32 {
    1.0
}

fn default_visible() -> bool {
    true
}

fn default_text_color() -> String {
    "#ffffff".to_string()
}

fn default_font_size() -> f32 {
    24.0
}
