use std::sync::Arc;

use storyline_audio::{AudioBuffer, PlayOptions};
use storyline_common::error::{StorylineError, StorylineResult};
use storyline_screenplay::DirectiveOp;

use super::{check_non_negative, DirectiveCore};
use crate::assets::AssetLoader;
use crate::context::StageContext;

/// Mixer commands: play, pause, stop and one-shot voice clips.
#[derive(Debug)]
pub struct SoundDirective {
    pub(crate) core: DirectiveCore,
    op: DirectiveOp,
    buffer: Option<Arc<AudioBuffer>>,
}

impl SoundDirective {
    pub fn new(core: DirectiveCore, op: &DirectiveOp) -> Self {
        Self {
            core,
            op: op.clone(),
            buffer: None,
        }
    }

    #[cfg(test)]
    pub(crate) fn unload(&mut self) {
        self.buffer = None;
    }

    fn sound(&self) -> &str {
        self.op.sound().unwrap_or_default()
    }

    pub(crate) fn check(&self) -> Result<Option<storyline_stage::NodeId>, String> {
        if self.sound().trim().is_empty() {
            return Err("sound name is empty".into());
        }
        match &self.op {
            DirectiveOp::Play { start, volume, .. } => {
                check_non_negative("start", *start)?;
                check_non_negative("volume", *volume as f64)?;
            }
            DirectiveOp::Voice { volume, .. } => check_non_negative("volume", *volume as f64)?,
            DirectiveOp::Pause { .. } | DirectiveOp::Stop { .. } => {}
            _ => return Err(format!("'{}' is not a sound command", self.core.kind)),
        }
        Ok(None)
    }

    pub(crate) async fn load(&mut self, assets: &dyn AssetLoader) -> StorylineResult<()> {
        if matches!(self.op, DirectiveOp::Play { .. } | DirectiveOp::Voice { .. }) {
            self.buffer = Some(assets.load_sound(self.sound()).await?);
        }
        Ok(())
    }

    /// Natural length of the sound when sequential, else zero.
    pub(crate) fn duration(&self) -> f64 {
        if !self.core.sequential {
            return 0.0;
        }
        let Some(buffer) = &self.buffer else {
            return 0.0;
        };
        match &self.op {
            DirectiveOp::Play { start, .. } => (buffer.duration_secs() - start).max(0.0),
            DirectiveOp::Voice { .. } => buffer.duration_secs(),
            _ => 0.0,
        }
    }

    pub(crate) fn execute(&mut self, ctx: &mut StageContext<'_>) -> StorylineResult<()> {
        let sound = self.sound().to_string();
        let options = match &self.op {
            DirectiveOp::Play {
                start,
                looping,
                volume,
                until_end,
                ..
            } => PlayOptions {
                start: Some(*start),
                looping: Some(*looping),
                volume: Some(*volume),
                until_end: Some(*until_end),
            },
            DirectiveOp::Voice { volume, .. } => PlayOptions {
                start: Some(0.0),
                looping: Some(false),
                volume: Some(*volume),
                until_end: Some(false),
            },
            DirectiveOp::Pause { .. } => {
                ctx.mixer.pause(&sound);
                return Ok(());
            }
            DirectiveOp::Stop { .. } => {
                ctx.mixer.stop(&sound);
                return Ok(());
            }
            _ => return Ok(()),
        };

        let buffer = self
            .buffer
            .clone()
            .ok_or_else(|| StorylineError::audio(format!("sound '{sound}' was not loaded")))?;
        ctx.mixer.play(&sound, buffer, options);
        Ok(())
    }
}
