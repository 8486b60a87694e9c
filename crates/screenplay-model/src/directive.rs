//! Directive configuration types.
//!
//! A directive config is the authored, inert form of a timed operation.
//! Configs are tagged by `kind` in JSON:
//!
//! ```json
//! { "kind": "fade", "target": "hero", "to": 0.0, "duration": 0.5 }
//! { "kind": "play", "sound": "music/theme.wav", "looping": true, "sequential": false }
//! ```

use serde::{Deserialize, Serialize};

/// One entry of a scene's script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectiveConfig {
    /// The operation and its parameters.
    #[serde(flatten)]
    pub op: DirectiveOp,

    /// Sequential directives advance the scene's running time by their
    /// duration; parallel ones start at the same time as the next directive.
    #[serde(default = "default_true")]
    pub sequential: bool,
}

/// Closed set of directive operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DirectiveOp {
    /// Make a node visible, fading in when `duration > 0`.
    Show {
        target: String,
        #[serde(default)]
        duration: f64,
    },

    /// Hide a node, fading out when `duration > 0`.
    Hide {
        target: String,
        #[serde(default)]
        duration: f64,
    },

    /// Animate a node's opacity.
    Fade {
        target: String,
        to: f32,
        duration: f64,
        #[serde(default)]
        easing: Easing,
    },

    /// Jitter a node around its position.
    Shake {
        target: String,
        duration: f64,
        #[serde(default = "default_shake_amplitude")]
        amplitude: f32,
    },

    /// Animate a node's scale.
    Zoom {
        target: String,
        to: f32,
        duration: f64,
        #[serde(default)]
        easing: Easing,
    },

    /// Slide a node in from outside the canvas to its authored position.
    Enter {
        target: String,
        from: Side,
        duration: f64,
        #[serde(default)]
        easing: Easing,
    },

    /// Slide a node out of the canvas and hide it.
    Leave {
        target: String,
        to: Side,
        duration: f64,
        #[serde(default)]
        easing: Easing,
    },

    /// Swap a sprite's image source.
    ChangeSource { target: String, source: String },

    /// Reveal a line of dialogue in a text node.
    Speak {
        target: String,
        text: String,
        /// Name shown in the scene's speaker label, if one is configured.
        #[serde(default)]
        speaker: Option<String>,
        /// Voice clip played for the duration of the line.
        #[serde(default)]
        voice: Option<String>,
        /// Overrides the scene's reading speed.
        #[serde(default)]
        wpm: Option<f64>,
        /// Overrides the scene's reveal mode.
        #[serde(default)]
        mode: Option<RevealMode>,
    },

    /// Start or update playback of a sound.
    Play {
        sound: String,
        /// Offset into the sound where playback begins (seconds).
        #[serde(default)]
        start: f64,
        #[serde(default)]
        looping: bool,
        #[serde(default = "default_volume")]
        volume: f32,
        /// Keep playing across scene boundaries.
        #[serde(default)]
        until_end: bool,
    },

    /// Freeze a playing sound, keeping its cursor.
    Pause { sound: String },

    /// Stop a sound and forget its cursor.
    Stop { sound: String },

    /// One-shot voice clip.
    Voice {
        sound: String,
        #[serde(default = "default_volume")]
        volume: f32,
    },

    /// Spacer that only takes time.
    Wait { duration: f64 },

    AddFilter { target: String, filter: FilterConfig },

    RemoveFilter { target: String, filter: FilterKind },

    /// Whole-scene opacity transition.
    Transition {
        effect: TransitionEffect,
        duration: f64,
    },
}

/// Easing curve applied to property tweens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Easing {
    #[default]
    Linear,
    EaseIn,
    EaseOut,
    EaseInOut,
}

impl Easing {
    /// Map linear progress in `[0, 1]` onto the curve.
    pub fn apply(self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::Linear => t,
            Easing::EaseIn => t * t,
            Easing::EaseOut => t * (2.0 - t),
            Easing::EaseInOut => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    -1.0 + (4.0 - 2.0 * t) * t
                }
            }
        }
    }
}

/// Canvas edge used by enter/leave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Left,
    Right,
    Top,
    Bottom,
}

/// How a speak directive reveals its text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevealMode {
    /// Characters appear one by one over the reading time.
    #[default]
    Typewriter,
    /// The whole line fades in over the reading time.
    Fade,
    /// The whole line appears at once.
    Instant,
}

/// Image filter attached to a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FilterConfig {
    Blur { radius: f32 },
    Grayscale,
    Sepia,
    Brightness { amount: f32 },
    Tint { color: String, strength: f32 },
}

/// Filter identity, used to remove a filter regardless of its parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    Blur,
    Grayscale,
    Sepia,
    Brightness,
    Tint,
}

impl FilterConfig {
    pub fn kind(&self) -> FilterKind {
        match self {
            FilterConfig::Blur { .. } => FilterKind::Blur,
            FilterConfig::Grayscale => FilterKind::Grayscale,
            FilterConfig::Sepia => FilterKind::Sepia,
            FilterConfig::Brightness { .. } => FilterKind::Brightness,
            FilterConfig::Tint { .. } => FilterKind::Tint,
        }
    }
}

/// Scene-level transition effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionEffect {
    FadeIn,
    FadeOut,
}

impl DirectiveOp {
    /// Stable snake_case name of the operation, as written in JSON.
    pub fn kind_name(&self) -> &'static str {
        match self {
            DirectiveOp::Show { .. } => "show",
            DirectiveOp::Hide { .. } => "hide",
            DirectiveOp::Fade { .. } => "fade",
            DirectiveOp::Shake { .. } => "shake",
            DirectiveOp::Zoom { .. } => "zoom",
            DirectiveOp::Enter { .. } => "enter",
            DirectiveOp::Leave { .. } => "leave",
            DirectiveOp::ChangeSource { .. } => "change_source",
            DirectiveOp::Speak { .. } => "speak",
            DirectiveOp::Play { .. } => "play",
            DirectiveOp::Pause { .. } => "pause",
            DirectiveOp::Stop { .. } => "stop",
            DirectiveOp::Voice { .. } => "voice",
            DirectiveOp::Wait { .. } => "wait",
            DirectiveOp::AddFilter { .. } => "add_filter",
            DirectiveOp::RemoveFilter { .. } => "remove_filter",
            DirectiveOp::Transition { .. } => "transition",
        }
    }

    /// Name of the node this operation acts on, if any.
    pub fn target(&self) -> Option<&str> {
        match self {
            DirectiveOp::Show { target, .. }
            | DirectiveOp::Hide { target, .. }
            | DirectiveOp::Fade { target, .. }
            | DirectiveOp::Shake { target, .. }
            | DirectiveOp::Zoom { target, .. }
            | DirectiveOp::Enter { target, .. }
            | DirectiveOp::Leave { target, .. }
            | DirectiveOp::ChangeSource { target, .. }
            | DirectiveOp::Speak { target, .. }
            | DirectiveOp::AddFilter { target, .. }
            | DirectiveOp::RemoveFilter { target, .. } => Some(target),
            DirectiveOp::Play { .. }
            | DirectiveOp::Pause { .. }
            | DirectiveOp::Stop { .. }
            | DirectiveOp::Voice { .. }
            | DirectiveOp::Wait { .. }
            | DirectiveOp::Transition { .. } => None,
        }
    }

    /// Sound asset referenced by this operation, if any.
    pub fn sound(&self) -> Option<&str> {
        match self {
            DirectiveOp::Play { sound, .. }
            | DirectiveOp::Pause { sound }
            | DirectiveOp::Stop { sound }
            | DirectiveOp::Voice { sound, .. } => Some(sound),
            DirectiveOp::Speak { voice, .. } => voice.as_deref(),
            _ => None,
        }
    }
}

impl DirectiveConfig {
    /// A sequential directive.
    pub fn new(op: DirectiveOp) -> Self {
        Self {
            op,
            sequential: true,
        }
    }

    /// A directive that does not advance the scene's running time.
    pub fn parallel(op: DirectiveOp) -> Self {
        Self {
            op,
            sequential: false,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_volume() -> f32 {
    1.0
}

fn default_shake_amplitude() -> f32 {
    8.0
}
