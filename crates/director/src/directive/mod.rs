//! Runtime directives.
//!
//! Every authored [`DirectiveConfig`] becomes one [`Directive`]. All
//! variants share a [`DirectiveCore`] and the same lifecycle:
//!
//! ```text
//! Uninstalled ──check()──► Compiled ──install──► Scheduled ──execute()──► Executed
//! ```
//!
//! `check` validates against the scene graph, `load` resolves assets,
//! `duration` feeds the scene's running time, and `execute` applies the
//! effect. States only move forward.

mod animation;
mod misc;
mod sound;
mod speak;

pub use animation::AnimationDirective;
pub use misc::{FilterDirective, TransitionDirective, WaitDirective};
pub use sound::SoundDirective;
pub use speak::{reading_time, reading_units, SpeakDirective, SpeakLine};

use storyline_common::error::{StorylineError, StorylineResult};
use storyline_screenplay::{DirectiveConfig, DirectiveOp, SceneDefaults, Subtitle};
use storyline_stage::{NodeId, SceneGraph};

use crate::assets::AssetLoader;
use crate::context::StageContext;

/// Lifecycle state of a directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DirectiveState {
    Uninstalled,
    Compiled,
    Scheduled,
    Executed,
}

/// Fields shared by every directive variant.
#[derive(Debug, Clone)]
pub struct DirectiveCore {
    /// Position in the scene's script.
    pub index: usize,
    pub kind: &'static str,
    /// Resolved target node, once checked.
    pub target: Option<NodeId>,
    /// Performance time at which the directive is due.
    pub execute_time: f64,
    /// Clock time it actually ran at.
    pub current_time: f64,
    pub sequential: bool,
    state: DirectiveState,
}

impl DirectiveCore {
    pub fn new(index: usize, kind: &'static str, sequential: bool) -> Self {
        Self {
            index,
            kind,
            target: None,
            execute_time: 0.0,
            current_time: 0.0,
            sequential,
            state: DirectiveState::Uninstalled,
        }
    }

    pub fn state(&self) -> DirectiveState {
        self.state
    }

    /// Move to `next`. Backward moves are ignored; returns whether the state changed.
    pub fn advance_to(&mut self, next: DirectiveState) -> bool {
        if next < self.state {
            tracing::warn!(
                directive = self.index,
                kind = self.kind,
                from = ?self.state,
                to = ?next,
                "Ignoring backward directive state transition"
            );
            return false;
        }
        if next == self.state {
            return false;
        }
        self.state = next;
        true
    }
}

/// A compiled, schedulable operation.
#[derive(Debug)]
pub enum Directive {
    Animation(AnimationDirective),
    Speak(SpeakDirective),
    Sound(SoundDirective),
    Wait(WaitDirective),
    Filter(FilterDirective),
    Transition(TransitionDirective),
}

impl Directive {
    /// Instantiate the runtime form of an authored directive.
    pub fn from_config(index: usize, config: &DirectiveConfig, defaults: &SceneDefaults) -> Self {
        let core = DirectiveCore::new(index, config.op.kind_name(), config.sequential);
        match &config.op {
            DirectiveOp::Show { .. }
            | DirectiveOp::Hide { .. }
            | DirectiveOp::Fade { .. }
            | DirectiveOp::Shake { .. }
            | DirectiveOp::Zoom { .. }
            | DirectiveOp::Enter { .. }
            | DirectiveOp::Leave { .. }
            | DirectiveOp::ChangeSource { .. } => Directive::Animation(AnimationDirective::new(
                core,
                &config.op,
                defaults.auto_show_targets,
            )),
            DirectiveOp::Speak {
                target,
                text,
                speaker,
                voice,
                wpm,
                mode,
            } => Directive::Speak(SpeakDirective::new(
                core,
                SpeakLine {
                    target: target.clone(),
                    text: text.clone(),
                    speaker: speaker.clone(),
                    voice: voice.clone(),
                    wpm: wpm.unwrap_or(defaults.speak.wpm),
                    mode: mode.unwrap_or(defaults.speak.mode),
                },
                defaults,
            )),
            DirectiveOp::Play { .. }
            | DirectiveOp::Pause { .. }
            | DirectiveOp::Stop { .. }
            | DirectiveOp::Voice { .. } => Directive::Sound(SoundDirective::new(core, &config.op)),
            DirectiveOp::Wait { duration } => Directive::Wait(WaitDirective::new(core, *duration)),
            DirectiveOp::AddFilter { target, filter } => {
                Directive::Filter(FilterDirective::add(core, target, filter.clone()))
            }
            DirectiveOp::RemoveFilter { target, filter } => {
                Directive::Filter(FilterDirective::remove(core, target, *filter))
            }
            DirectiveOp::Transition { effect, duration } => {
                Directive::Transition(TransitionDirective::new(core, *effect, *duration))
            }
        }
    }

    pub fn core(&self) -> &DirectiveCore {
        match self {
            Directive::Animation(d) => &d.core,
            Directive::Speak(d) => &d.core,
            Directive::Sound(d) => &d.core,
            Directive::Wait(d) => &d.core,
            Directive::Filter(d) => &d.core,
            Directive::Transition(d) => &d.core,
        }
    }

    pub fn core_mut(&mut self) -> &mut DirectiveCore {
        match self {
            Directive::Animation(d) => &mut d.core,
            Directive::Speak(d) => &mut d.core,
            Directive::Sound(d) => &mut d.core,
            Directive::Wait(d) => &mut d.core,
            Directive::Filter(d) => &mut d.core,
            Directive::Transition(d) => &mut d.core,
        }
    }

    pub fn kind(&self) -> &'static str {
        self.core().kind
    }

    pub fn state(&self) -> DirectiveState {
        self.core().state()
    }

    /// Validate against the scene graph and resolve the target node.
    pub fn check(&mut self, graph: &SceneGraph, scene: &str) -> StorylineResult<()> {
        let checked = match self {
            Directive::Animation(d) => d.check(graph),
            Directive::Speak(d) => d.check(graph),
            Directive::Sound(d) => d.check(),
            Directive::Wait(d) => d.check(),
            Directive::Filter(d) => d.check(graph),
            Directive::Transition(d) => d.check(),
        };
        let core = self.core_mut();
        match checked {
            Ok(target) => {
                core.target = target;
                core.advance_to(DirectiveState::Compiled);
                Ok(())
            }
            Err(message) => Err(StorylineError::compile(scene, core.index, core.kind, message)),
        }
    }

    /// Resolve any assets the directive needs before the performance starts.
    pub async fn load(&mut self, assets: &dyn AssetLoader) -> StorylineResult<()> {
        match self {
            Directive::Animation(d) => d.load(assets).await,
            Directive::Speak(d) => d.load(assets).await,
            Directive::Sound(d) => d.load(assets).await,
            Directive::Wait(_) | Directive::Filter(_) | Directive::Transition(_) => Ok(()),
        }
    }

    /// Seconds this directive adds to the scene's running time when sequential.
    pub fn duration(&self) -> f64 {
        match self {
            Directive::Animation(d) => d.duration(),
            Directive::Speak(d) => d.duration(),
            Directive::Sound(d) => d.duration(),
            Directive::Wait(d) => d.duration(),
            Directive::Filter(_) => 0.0,
            Directive::Transition(d) => d.duration(),
        }
    }

    /// Mark as handed to the clock.
    pub fn schedule(&mut self) {
        self.core_mut().advance_to(DirectiveState::Scheduled);
    }

    /// Apply the directive. Runs at most once; later calls are no-ops.
    pub fn execute(&mut self, ctx: &mut StageContext<'_>) -> StorylineResult<()> {
        if self.state() == DirectiveState::Executed {
            tracing::warn!(
                directive = self.core().index,
                kind = self.kind(),
                "Directive already executed"
            );
            return Ok(());
        }
        self.core_mut().current_time = ctx.time;
        tracing::debug!(
            directive = self.core().index,
            kind = self.kind(),
            due = self.core().execute_time,
            time = ctx.time,
            "Executing directive"
        );

        match self {
            Directive::Animation(d) => d.execute(ctx)?,
            Directive::Speak(d) => d.execute(ctx)?,
            Directive::Sound(d) => d.execute(ctx)?,
            Directive::Wait(_) => {}
            Directive::Filter(d) => d.execute(ctx)?,
            Directive::Transition(d) => d.execute(ctx),
        }
        self.core_mut().advance_to(DirectiveState::Executed);
        Ok(())
    }

    /// Subtitle cue for this directive, if it produces one.
    pub fn subtitle(&self) -> Option<Subtitle> {
        match self {
            Directive::Speak(d) => Some(d.subtitle()),
            _ => None,
        }
    }
}

/// Resolve a node name, for `check` implementations.
pub(crate) fn resolve_target(graph: &SceneGraph, name: &str) -> Result<NodeId, String> {
    graph
        .find(name)
        .ok_or_else(|| format!("unknown target '{name}'"))
}

/// Reject negative and non-finite values.
pub(crate) fn check_non_negative(field: &str, value: f64) -> Result<(), String> {
    if !value.is_finite() || value < 0.0 {
        return Err(format!("{field} must be a finite, non-negative number (got {value})"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use storyline_screenplay::{Easing, NodeConfig};

    fn graph() -> SceneGraph {
        SceneGraph::build(
            &NodeConfig::container("root")
                .child(NodeConfig::sprite("hero", "#ffffff"))
                .child(NodeConfig::text("line")),
        )
        .unwrap()
    }

    #[test]
    fn test_state_never_regresses() {
        let mut core = DirectiveCore::new(0, "wait", true);
        assert!(core.advance_to(DirectiveState::Compiled));
        assert!(core.advance_to(DirectiveState::Executed));
        assert!(!core.advance_to(DirectiveState::Scheduled));
        assert_eq!(core.state(), DirectiveState::Executed);
    }

    #[test]
    fn test_check_resolves_target_and_compiles() {
        let config = DirectiveConfig::new(DirectiveOp::Fade {
            target: "hero".into(),
            to: 0.5,
            duration: 1.0,
            easing: Easing::Linear,
        });
        let graph = graph();
        let mut directive = Directive::from_config(2, &config, &SceneDefaults::default());
        directive.check(&graph, "intro").unwrap();
        assert_eq!(directive.state(), DirectiveState::Compiled);
        assert_eq!(directive.core().target, graph.find("hero"));
        assert_eq!(directive.duration(), 1.0);
    }

    #[test]
    fn test_check_failure_is_compile_error() {
        let config = DirectiveConfig::new(DirectiveOp::Fade {
            target: "ghost".into(),
            to: 0.5,
            duration: 1.0,
            easing: Easing::Linear,
        });
        let mut directive = Directive::from_config(4, &config, &SceneDefaults::default());
        match directive.check(&graph(), "intro") {
            Err(StorylineError::Compile {
                scene,
                directive,
                kind,
                message,
            }) => {
                assert_eq!(scene, "intro");
                assert_eq!(directive, 4);
                assert_eq!(kind, "fade");
                assert!(message.contains("ghost"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_negative_wait_rejected() {
        let config = DirectiveConfig::new(DirectiveOp::Wait { duration: -1.0 });
        let mut directive = Directive::from_config(0, &config, &SceneDefaults::default());
        assert!(directive.check(&graph(), "s").is_err());

        let config = DirectiveConfig::new(DirectiveOp::Wait { duration: f64::NAN });
        let mut directive = Directive::from_config(0, &config, &SceneDefaults::default());
        assert!(directive.check(&graph(), "s").is_err());
    }
}
