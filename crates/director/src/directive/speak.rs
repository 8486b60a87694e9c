use std::sync::Arc;

use storyline_audio::{AudioBuffer, PlayOptions};
use storyline_common::error::{StorylineError, StorylineResult};
use storyline_screenplay::{Easing, RevealMode, SceneDefaults, Subtitle};
use storyline_stage::{NodeId, NodeProperty, SceneGraph, Tween};

use super::{resolve_target, DirectiveCore};
use crate::assets::AssetLoader;
use crate::context::{StageContext, TimerAction};

/// Authored parameters of a spoken line, with scene defaults applied.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeakLine {
    pub target: String,
    pub text: String,
    pub speaker: Option<String>,
    pub voice: Option<String>,
    pub wpm: f64,
    pub mode: RevealMode,
}

fn is_cjk(c: char) -> bool {
    matches!(c as u32,
        0x4E00..=0x9FFF
        | 0x3400..=0x4DBF
        | 0x3040..=0x30FF
        | 0xAC00..=0xD7AF
        | 0xF900..=0xFAFF)
}

fn is_cjk_punctuation(c: char) -> bool {
    matches!(c as u32, 0x3000..=0x303F | 0xFF00..=0xFFEF)
}

/// Count reading units: each CJK character is one unit, and each run of
/// other non-whitespace characters is one word.
pub fn reading_units(text: &str) -> usize {
    let mut units = 0;
    let mut in_word = false;
    for c in text.chars() {
        if is_cjk(c) {
            units += 1;
            in_word = false;
        } else if c.is_whitespace() || is_cjk_punctuation(c) {
            in_word = false;
        } else if !in_word {
            units += 1;
            in_word = true;
        }
    }
    units
}

/// Seconds needed to read `text` at `wpm` words per minute.
pub fn reading_time(text: &str, wpm: f64) -> f64 {
    if wpm <= 0.0 {
        return 0.0;
    }
    reading_units(text) as f64 / (wpm / 60.0)
}

/// Shows a line of dialogue, optionally with a speaker name and voice clip.
#[derive(Debug)]
pub struct SpeakDirective {
    pub(crate) core: DirectiveCore,
    line: SpeakLine,
    line_gap_secs: f64,
    auto_show_text: bool,
    speaker_label: Option<String>,
    label_node: Option<NodeId>,
    voice_buffer: Option<Arc<AudioBuffer>>,
}

impl SpeakDirective {
    pub fn new(core: DirectiveCore, line: SpeakLine, defaults: &SceneDefaults) -> Self {
        Self {
            core,
            line,
            line_gap_secs: defaults.speak.line_gap_secs,
            auto_show_text: defaults.auto_show_text,
            speaker_label: defaults.speak.speaker_label.clone(),
            label_node: None,
            voice_buffer: None,
        }
    }

    pub fn line(&self) -> &SpeakLine {
        &self.line
    }

    pub(crate) fn check(&mut self, graph: &SceneGraph) -> Result<Option<NodeId>, String> {
        if !self.line.wpm.is_finite() || self.line.wpm <= 0.0 {
            return Err(format!("wpm must be positive (got {})", self.line.wpm));
        }
        let target = resolve_target(graph, &self.line.target)?;
        if !graph.node(target).is_text() {
            return Err(format!("'{}' is not a text node", self.line.target));
        }

        if let Some(label) = &self.speaker_label {
            let id = resolve_target(graph, label).map_err(|e| format!("speaker label: {e}"))?;
            if !graph.node(id).is_text() {
                return Err(format!("speaker label '{label}' is not a text node"));
            }
            self.label_node = Some(id);
        }
        Ok(Some(target))
    }

    pub(crate) async fn load(&mut self, assets: &dyn AssetLoader) -> StorylineResult<()> {
        if let Some(voice) = &self.line.voice {
            self.voice_buffer = Some(assets.load_sound(voice).await?);
        }
        Ok(())
    }

    fn reading_secs(&self) -> f64 {
        reading_time(&self.line.text, self.line.wpm)
    }

    /// Reading time plus the line gap; zero for a line with nothing to read.
    pub(crate) fn duration(&self) -> f64 {
        if reading_units(&self.line.text) == 0 {
            return 0.0;
        }
        self.reading_secs() + self.line_gap_secs
    }

    pub(crate) fn execute(&mut self, ctx: &mut StageContext<'_>) -> StorylineResult<()> {
        let target = self
            .core
            .target
            .ok_or_else(|| StorylineError::render("speak executed before check"))?;
        let reading = self.reading_secs();

        ctx.graph.node_mut(target).set_text(&self.line.text);
        if self.auto_show_text {
            ctx.reveal(target);
        }

        match self.line.mode {
            RevealMode::Typewriter if reading > 0.0 => {
                ctx.tweens.add(
                    Tween::from_to(target, NodeProperty::Reveal, 0.0, 1.0, reading, Easing::Linear),
                    ctx.time,
                );
            }
            RevealMode::Fade if reading > 0.0 => {
                let node = ctx.graph.node_mut(target);
                node.set_property(NodeProperty::Reveal, 1.0);
                let alpha = node.origin.alpha;
                ctx.tweens.add(
                    Tween::from_to(target, NodeProperty::Alpha, 0.0, alpha, reading, Easing::Linear),
                    ctx.time,
                );
            }
            _ => ctx.graph.node_mut(target).set_property(NodeProperty::Reveal, 1.0),
        }

        if let Some(label) = self.label_node {
            match &self.line.speaker {
                Some(name) => {
                    ctx.graph.node_mut(label).set_text(name);
                    ctx.reveal(label);
                }
                None => ctx.graph.node_mut(label).set_text(""),
            }
        }

        if let (Some(voice), Some(buffer)) = (&self.line.voice, &self.voice_buffer) {
            ctx.mixer.play(
                voice,
                Arc::clone(buffer),
                PlayOptions {
                    start: Some(0.0),
                    looping: Some(false),
                    volume: Some(1.0),
                    until_end: Some(false),
                },
            );
            let duration = self.duration();
            if duration > 0.0 {
                ctx.timers
                    .schedule(ctx.time + duration, TimerAction::StopSound(voice.clone()));
            }
        }
        Ok(())
    }

    /// Cue for this line; blank lines yield a zero-length cue.
    pub(crate) fn subtitle(&self) -> Subtitle {
        let start = self.core.execute_time;
        Subtitle {
            start,
            end: start + self.duration(),
            text: self.line.text.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use storyline_audio::AudioMixer;
    use storyline_screenplay::{DirectiveConfig, DirectiveOp, NodeConfig};
    use storyline_stage::TweenTimeline;

    use crate::assets::MemoryAssetLoader;
    use crate::context::SceneTimers;
    use crate::directive::Directive;

    fn speak(text: &str, wpm: Option<f64>) -> DirectiveOp {
        DirectiveOp::Speak {
            target: "line".into(),
            text: text.into(),
            speaker: None,
            voice: None,
            wpm,
            mode: None,
        }
    }

    fn graph() -> SceneGraph {
        SceneGraph::build(
            &NodeConfig::container("root")
                .child(NodeConfig::text("line"))
                .child(NodeConfig::text("who")),
        )
        .unwrap()
    }

    #[test]
    fn test_reading_units_mixes_cjk_and_words() {
        assert_eq!(reading_units("你好hello"), 3);
        assert_eq!(reading_units("hello there, world"), 3);
        assert_eq!(reading_units("你好，世界。"), 4);
        assert_eq!(reading_units("  "), 0);
        assert_eq!(reading_units(""), 0);
    }

    #[test]
    fn test_duration_includes_line_gap() {
        let config = DirectiveConfig::new(speak("你好hello", Some(600.0)));
        let directive = Directive::from_config(0, &config, &SceneDefaults::default());
        assert!((directive.duration() - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_blank_line_takes_no_time() {
        let config = DirectiveConfig::new(speak("   ", None));
        let mut directive = Directive::from_config(0, &config, &SceneDefaults::default());
        directive.check(&graph(), "s").unwrap();
        assert_eq!(directive.duration(), 0.0);
        let cue = directive.subtitle().unwrap();
        assert_eq!(cue.start, cue.end);
    }

    #[test]
    fn test_subtitle_spans_duration() {
        let config = DirectiveConfig::new(speak("one two three", Some(180.0)));
        let mut directive = Directive::from_config(0, &config, &SceneDefaults::default());
        directive.core_mut().execute_time = 2.0;
        let cue = directive.subtitle().unwrap();
        assert_eq!(cue.start, 2.0);
        assert!((cue.end - 3.5).abs() < 1e-9);
        assert_eq!(cue.text, "one two three");
    }

    #[test]
    fn test_zero_wpm_rejected() {
        let config = DirectiveConfig::new(speak("hi", Some(0.0)));
        let mut directive = Directive::from_config(0, &config, &SceneDefaults::default());
        assert!(directive.check(&graph(), "s").is_err());
    }

    #[tokio::test]
    async fn test_execute_reveals_text_speaker_and_voice() {
        let mut defaults = SceneDefaults::default();
        defaults.speak.speaker_label = Some("who".into());
        let config = DirectiveConfig::new(DirectiveOp::Speak {
            target: "line".into(),
            text: "hi there".into(),
            speaker: Some("Ada".into()),
            voice: Some("ada.wav".into()),
            wpm: Some(120.0),
            mode: None,
        });
        let assets = MemoryAssetLoader::new().with_sound("ada.wav", AudioBuffer::silent(100, 1, 500));

        let mut graph = graph();
        graph.hide_scene_children();
        let mut directive = Directive::from_config(0, &config, &defaults);
        directive.check(&graph, "s").unwrap();
        directive.load(&assets).await.unwrap();

        let mut tweens = TweenTimeline::paused();
        let mut mixer = AudioMixer::new(1);
        let mut timers = SceneTimers::new();
        let mut hooks = vec![];
        let mut ctx = StageContext {
            time: 1.0,
            fps: 10,
            canvas: (8, 8),
            graph: &mut graph,
            tweens: &mut tweens,
            mixer: &mut mixer,
            timers: &mut timers,
            hooks: &mut hooks,
        };
        directive.execute(&mut ctx).unwrap();

        let line = graph.find("line").unwrap();
        let who = graph.find("who").unwrap();
        assert!(graph.node(line).visible);
        assert!(graph.node(who).visible);
        assert!(matches!(
            &graph.node(who).content,
            storyline_stage::NodeContent::Text { content, .. } if content == "Ada"
        ));
        assert!(mixer.record("ada.wav").is_some());

        // 2 words at 120 wpm = 1s, plus the 0.5s gap.
        assert!(timers.take_due(2.4, 0.05).is_empty());
        assert_eq!(
            timers.take_due(2.5, 0.05),
            vec![TimerAction::StopSound("ada.wav".into())]
        );

        tweens.seek(1.5, &mut graph);
        assert!((graph.node(line).property(NodeProperty::Reveal) - 0.5).abs() < 1e-6);
    }

    proptest! {
        #[test]
        fn prop_units_bounded_by_chars(text in "\\PC{0,40}") {
            prop_assert!(reading_units(&text) <= text.chars().count());
        }

        #[test]
        fn prop_reading_time_scales_inversely_with_wpm(words in 1usize..20, wpm in 30.0f64..900.0) {
            let text = vec!["word"; words].join(" ");
            let t1 = reading_time(&text, wpm);
            let t2 = reading_time(&text, wpm * 2.0);
            prop_assert!((t1 - 2.0 * t2).abs() < 1e-9);
        }
    }
}
