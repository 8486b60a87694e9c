//! Error types shared across Storyline crates.

use std::path::PathBuf;

/// Top-level error type for Storyline operations.
#[derive(Debug, thiserror::Error)]
pub enum StorylineError {
    /// A directive rejected its configuration while the screenplay was compiled.
    #[error("Compile error in scene '{scene}', directive #{directive} ({kind}): {message}")]
    Compile {
        scene: String,
        directive: usize,
        kind: String,
        message: String,
    },

    #[error("Failed to load resource '{resource}': {message}")]
    ResourceLoad { resource: String, message: String },

    #[error("Encoding failed: {cause}")]
    Encode { cause: String },

    #[error("Render error: {message}")]
    Render { message: String },

    #[error("Audio error: {message}")]
    Audio { message: String },

    #[error("Screenplay error: {message}")]
    Screenplay { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Unsupported operation: {message}")]
    Unsupported { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using StorylineError.
pub type StorylineResult<T> = Result<T, StorylineError>;

impl StorylineError {
    pub fn compile(
        scene: impl Into<String>,
        directive: usize,
        kind: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        Self::Compile {
            scene: scene.into(),
            directive,
            kind: kind.into(),
            message: msg.into(),
        }
    }

    pub fn resource_load(resource: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::ResourceLoad {
            resource: resource.into(),
            message: msg.into(),
        }
    }

    pub fn encode(cause: impl Into<String>) -> Self {
        Self::Encode {
            cause: cause.into(),
        }
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render {
            message: msg.into(),
        }
    }

    pub fn audio(msg: impl Into<String>) -> Self {
        Self::Audio {
            message: msg.into(),
        }
    }

    pub fn screenplay(msg: impl Into<String>) -> Self {
        Self::Screenplay {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported {
            message: msg.into(),
        }
    }

    /// Whether this error came from the encoder/muxer path.
    pub fn is_encode(&self) -> bool {
        matches!(self, Self::Encode { .. })
    }
}
