use std::sync::Arc;

use storyline_common::error::{StorylineError, StorylineResult};
use storyline_screenplay::{DirectiveOp, Easing, Side};
use storyline_stage::{NodeId, NodeProperty, RenderableSource, SceneGraph, Tween, TweenAction};

use super::{check_non_negative, resolve_target, DirectiveCore};
use crate::assets::AssetLoader;
use crate::context::StageContext;

/// Property animations and source swaps on a single node.
#[derive(Debug)]
pub struct AnimationDirective {
    pub(crate) core: DirectiveCore,
    op: DirectiveOp,
    auto_show: bool,
    source: Option<Arc<dyn RenderableSource>>,
}

impl AnimationDirective {
    pub fn new(core: DirectiveCore, op: &DirectiveOp, auto_show: bool) -> Self {
        Self {
            core,
            op: op.clone(),
            auto_show,
            source: None,
        }
    }

    pub(crate) fn check(&self, graph: &SceneGraph) -> Result<Option<NodeId>, String> {
        let name = self
            .op
            .target()
            .ok_or_else(|| format!("'{}' is not an animation", self.core.kind))?;
        let target = resolve_target(graph, name)?;

        match &self.op {
            DirectiveOp::Show { duration, .. }
            | DirectiveOp::Hide { duration, .. }
            | DirectiveOp::Enter { duration, .. }
            | DirectiveOp::Leave { duration, .. } => check_non_negative("duration", *duration)?,
            DirectiveOp::Fade { to, duration, .. } => {
                check_non_negative("duration", *duration)?;
                if !(0.0..=1.0).contains(to) {
                    return Err(format!("fade target opacity must be within 0..=1 (got {to})"));
                }
            }
            DirectiveOp::Shake {
                duration,
                amplitude,
                ..
            } => {
                check_non_negative("duration", *duration)?;
                check_non_negative("amplitude", *amplitude as f64)?;
            }
            DirectiveOp::Zoom { to, duration, .. } => {
                check_non_negative("duration", *duration)?;
                check_non_negative("scale", *to as f64)?;
            }
            DirectiveOp::ChangeSource { .. } => {
                if !graph.node(target).is_sprite() {
                    return Err(format!("'{name}' is not a sprite"));
                }
            }
            _ => return Err(format!("'{}' is not an animation", self.core.kind)),
        }
        Ok(Some(target))
    }

    pub(crate) async fn load(&mut self, assets: &dyn AssetLoader) -> StorylineResult<()> {
        if let DirectiveOp::ChangeSource { source, .. } = &self.op {
            self.source = Some(assets.load_source(source).await?);
        }
        Ok(())
    }

    pub(crate) fn duration(&self) -> f64 {
        match &self.op {
            DirectiveOp::Show { duration, .. }
            | DirectiveOp::Hide { duration, .. }
            | DirectiveOp::Fade { duration, .. }
            | DirectiveOp::Shake { duration, .. }
            | DirectiveOp::Zoom { duration, .. }
            | DirectiveOp::Enter { duration, .. }
            | DirectiveOp::Leave { duration, .. } => *duration,
            _ => 0.0,
        }
    }

    pub(crate) fn execute(&mut self, ctx: &mut StageContext<'_>) -> StorylineResult<()> {
        let target = self
            .core
            .target
            .ok_or_else(|| StorylineError::render(format!("{} executed before check", self.core.kind)))?;
        let at = ctx.time;

        match &self.op {
            DirectiveOp::Show { duration, .. } => {
                ctx.reveal(target);
                if *duration > 0.0 {
                    let alpha = ctx.graph.node(target).origin.alpha;
                    ctx.tweens.add(
                        Tween::from_to(target, NodeProperty::Alpha, 0.0, alpha, *duration, Easing::Linear),
                        at,
                    );
                }
            }
            DirectiveOp::Hide { duration, .. } => {
                if *duration > 0.0 {
                    ctx.tweens.add(
                        Tween::to(target, NodeProperty::Alpha, 0.0, *duration, Easing::Linear)
                            .on_complete(TweenAction::Hide)
                            .on_complete(TweenAction::RestoreOrigin),
                        at,
                    );
                } else {
                    let node = ctx.graph.node_mut(target);
                    node.visible = false;
                    node.restore_origin();
                }
            }
            DirectiveOp::Fade {
                to,
                duration,
                easing,
                ..
            } => {
                self.auto_reveal(ctx, target);
                ctx.tweens
                    .add(Tween::to(target, NodeProperty::Alpha, *to, *duration, *easing), at);
            }
            DirectiveOp::Shake {
                duration,
                amplitude,
                ..
            } => {
                self.auto_reveal(ctx, target);
                ctx.tweens.add(Tween::shake(target, *amplitude, *duration), at);
            }
            DirectiveOp::Zoom {
                to,
                duration,
                easing,
                ..
            } => {
                self.auto_reveal(ctx, target);
                ctx.tweens
                    .add(Tween::to(target, NodeProperty::Scale, *to, *duration, *easing), at);
            }
            DirectiveOp::Enter {
                from,
                duration,
                easing,
                ..
            } => {
                ctx.reveal(target);
                let (property, start, home) = offscreen(ctx, target, *from);
                ctx.tweens
                    .add(Tween::from_to(target, property, start, home, *duration, *easing), at);
            }
            DirectiveOp::Leave {
                to,
                duration,
                easing,
                ..
            } => {
                let (property, away, _) = offscreen(ctx, target, *to);
                ctx.tweens.add(
                    Tween::to(target, property, away, *duration, *easing)
                        .on_complete(TweenAction::Hide)
                        .on_complete(TweenAction::RestoreOrigin),
                    at,
                );
            }
            DirectiveOp::ChangeSource { source, .. } => {
                let loaded = self
                    .source
                    .clone()
                    .ok_or_else(|| StorylineError::resource_load(source, "source was not loaded"))?;
                self.auto_reveal(ctx, target);
                ctx.graph.node_mut(target).set_source(loaded, at);
            }
            _ => {}
        }
        Ok(())
    }

    fn auto_reveal(&self, ctx: &mut StageContext<'_>, target: NodeId) {
        if self.auto_show {
            ctx.reveal(target);
        }
    }
}

/// Animated axis, the coordinate just outside `side` of the canvas, and the
/// node's authored coordinate on that axis.
fn offscreen(ctx: &StageContext<'_>, target: NodeId, side: Side) -> (NodeProperty, f32, f32) {
    let node = ctx.graph.node(target);
    let (canvas_w, canvas_h) = (ctx.canvas.0 as f32, ctx.canvas.1 as f32);
    match side {
        Side::Left => (NodeProperty::X, -node.width * node.scale, node.origin.x),
        Side::Right => (NodeProperty::X, canvas_w, node.origin.x),
        Side::Top => (NodeProperty::Y, -node.height * node.scale, node.origin.y),
        Side::Bottom => (NodeProperty::Y, canvas_h, node.origin.y),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storyline_audio::AudioMixer;
    use storyline_screenplay::{NodeConfig, SceneDefaults};
    use storyline_stage::TweenTimeline;

    use crate::context::SceneTimers;
    use crate::directive::Directive;
    use storyline_screenplay::DirectiveConfig;

    struct Stage {
        graph: SceneGraph,
        tweens: TweenTimeline,
        mixer: AudioMixer,
        timers: SceneTimers,
        hooks: Vec<storyline_stage::RenderHook>,
    }

    impl Stage {
        fn new() -> Self {
            let config = NodeConfig::container("root")
                .at(0.0, 0.0, 100.0, 100.0)
                .child(NodeConfig::sprite("hero", "#ff0000").at(10.0, 20.0, 30.0, 40.0));
            let mut graph = SceneGraph::build(&config).unwrap();
            graph.hide_scene_children();
            Self {
                graph,
                tweens: TweenTimeline::paused(),
                mixer: AudioMixer::new(1),
                timers: SceneTimers::new(),
                hooks: vec![],
            }
        }

        fn run(&mut self, op: DirectiveOp, time: f64) {
            let mut directive =
                Directive::from_config(0, &DirectiveConfig::new(op), &SceneDefaults::default());
            directive.check(&self.graph, "test").unwrap();
            let mut ctx = StageContext {
                time,
                fps: 10,
                canvas: (100, 100),
                graph: &mut self.graph,
                tweens: &mut self.tweens,
                mixer: &mut self.mixer,
                timers: &mut self.timers,
                hooks: &mut self.hooks,
            };
            directive.execute(&mut ctx).unwrap();
        }

        fn seek(&mut self, time: f64) {
            self.tweens.seek(time, &mut self.graph);
        }

        fn hero(&self) -> &storyline_stage::Node {
            self.graph.node(self.graph.find("hero").unwrap())
        }
    }

    #[test]
    fn test_show_fades_in_from_transparent() {
        let mut stage = Stage::new();
        stage.run(
            DirectiveOp::Show {
                target: "hero".into(),
                duration: 1.0,
            },
            2.0,
        );
        stage.seek(2.0);
        assert!(stage.hero().visible);
        assert_eq!(stage.hero().alpha, 0.0);
        stage.seek(2.5);
        assert!((stage.hero().alpha - 0.5).abs() < 1e-6);
        stage.seek(3.0);
        assert_eq!(stage.hero().alpha, 1.0);
    }

    #[test]
    fn test_hide_restores_origin_after_fading_out() {
        let mut stage = Stage::new();
        stage.run(
            DirectiveOp::Show {
                target: "hero".into(),
                duration: 0.0,
            },
            0.0,
        );
        stage.run(
            DirectiveOp::Hide {
                target: "hero".into(),
                duration: 0.5,
            },
            1.0,
        );
        stage.seek(1.25);
        assert!(stage.hero().visible);
        assert!((stage.hero().alpha - 0.5).abs() < 1e-6);
        stage.seek(1.5);
        assert!(!stage.hero().visible);
        assert_eq!(stage.hero().alpha, 1.0);
    }

    #[test]
    fn test_enter_slides_in_from_left() {
        let mut stage = Stage::new();
        stage.run(
            DirectiveOp::Enter {
                target: "hero".into(),
                from: Side::Left,
                duration: 1.0,
                easing: Easing::Linear,
            },
            0.0,
        );
        stage.seek(0.0);
        assert!(stage.hero().visible);
        assert_eq!(stage.hero().x, -30.0);
        stage.seek(1.0);
        assert_eq!(stage.hero().x, 10.0);
    }

    #[test]
    fn test_leave_hides_and_returns_home() {
        let mut stage = Stage::new();
        stage.graph.node_mut(stage.graph.find("hero").unwrap()).visible = true;
        stage.run(
            DirectiveOp::Leave {
                target: "hero".into(),
                to: Side::Bottom,
                duration: 0.5,
                easing: Easing::Linear,
            },
            0.0,
        );
        stage.seek(0.25);
        assert!(stage.hero().y > 20.0);
        stage.seek(0.5);
        assert!(!stage.hero().visible);
        assert_eq!(stage.hero().y, 20.0);
    }

    #[test]
    fn test_fade_auto_shows_target() {
        let mut stage = Stage::new();
        stage.run(
            DirectiveOp::Fade {
                target: "hero".into(),
                to: 0.2,
                duration: 0.0,
                easing: Easing::Linear,
            },
            0.0,
        );
        stage.seek(0.0);
        assert!(stage.hero().visible);
        assert!((stage.hero().alpha - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_fade_out_of_range_rejected() {
        let stage = Stage::new();
        let mut directive = Directive::from_config(
            0,
            &DirectiveConfig::new(DirectiveOp::Fade {
                target: "hero".into(),
                to: 1.5,
                duration: 1.0,
                easing: Easing::Linear,
            }),
            &SceneDefaults::default(),
        );
        assert!(directive.check(&stage.graph, "test").is_err());
    }

    #[test]
    fn test_change_source_requires_sprite() {
        let config = NodeConfig::container("root").child(NodeConfig::text("caption"));
        let graph = SceneGraph::build(&config).unwrap();
        let mut directive = Directive::from_config(
            0,
            &DirectiveConfig::new(DirectiveOp::ChangeSource {
                target: "caption".into(),
                source: "face.png".into(),
            }),
            &SceneDefaults::default(),
        );
        assert!(directive.check(&graph, "test").is_err());
    }
}
