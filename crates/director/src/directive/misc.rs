use storyline_common::error::{StorylineError, StorylineResult};
use storyline_screenplay::{FilterConfig, FilterKind, TransitionEffect};
use storyline_stage::{parse_color, Filter, NodeId, RenderHook, SceneGraph};

use super::{check_non_negative, resolve_target, DirectiveCore};
use crate::context::StageContext;

/// Spacer that only takes time.
#[derive(Debug)]
pub struct WaitDirective {
    pub(crate) core: DirectiveCore,
    duration: f64,
}

impl WaitDirective {
    pub fn new(core: DirectiveCore, duration: f64) -> Self {
        Self { core, duration }
    }

    pub(crate) fn check(&self) -> Result<Option<NodeId>, String> {
        check_non_negative("duration", self.duration)?;
        Ok(None)
    }

    pub(crate) fn duration(&self) -> f64 {
        self.duration
    }
}

#[derive(Debug)]
enum FilterChange {
    Add(FilterConfig),
    Remove(FilterKind),
}

/// Attaches or detaches an image filter on a node.
#[derive(Debug)]
pub struct FilterDirective {
    pub(crate) core: DirectiveCore,
    target: String,
    change: FilterChange,
}

impl FilterDirective {
    pub fn add(core: DirectiveCore, target: &str, filter: FilterConfig) -> Self {
        Self {
            core,
            target: target.to_string(),
            change: FilterChange::Add(filter),
        }
    }

    pub fn remove(core: DirectiveCore, target: &str, kind: FilterKind) -> Self {
        Self {
            core,
            target: target.to_string(),
            change: FilterChange::Remove(kind),
        }
    }

    pub(crate) fn check(&self, graph: &SceneGraph) -> Result<Option<NodeId>, String> {
        let target = resolve_target(graph, &self.target)?;
        if let FilterChange::Add(filter) = &self.change {
            match filter {
                FilterConfig::Blur { radius } => check_non_negative("radius", *radius as f64)?,
                FilterConfig::Brightness { amount } => {
                    check_non_negative("amount", *amount as f64)?
                }
                FilterConfig::Tint { color, strength } => {
                    parse_color(color).map_err(|e| e.to_string())?;
                    if !(0.0..=1.0).contains(strength) {
                        return Err(format!("tint strength must be within 0..=1 (got {strength})"));
                    }
                }
                FilterConfig::Grayscale | FilterConfig::Sepia => {}
            }
        }
        Ok(Some(target))
    }

    pub(crate) fn execute(&mut self, ctx: &mut StageContext<'_>) -> StorylineResult<()> {
        let target = self
            .core
            .target
            .ok_or_else(|| StorylineError::render("filter executed before check"))?;
        let node = ctx.graph.node_mut(target);
        match &self.change {
            FilterChange::Add(config) => {
                let filter = Filter::from_config(config)?;
                let kind = filter.kind();
                node.filters.retain(|f| f.kind() != kind);
                node.filters.push(filter);
            }
            FilterChange::Remove(kind) => node.filters.retain(|f| f.kind() != *kind),
        }
        Ok(())
    }
}

/// Fades the whole scene in or out through a render hook.
#[derive(Debug)]
pub struct TransitionDirective {
    pub(crate) core: DirectiveCore,
    effect: TransitionEffect,
    duration: f64,
}

impl TransitionDirective {
    pub fn new(core: DirectiveCore, effect: TransitionEffect, duration: f64) -> Self {
        Self {
            core,
            effect,
            duration,
        }
    }

    pub(crate) fn check(&self) -> Result<Option<NodeId>, String> {
        check_non_negative("duration", self.duration)?;
        Ok(None)
    }

    pub(crate) fn duration(&self) -> f64 {
        self.duration
    }

    pub(crate) fn execute(&mut self, ctx: &mut StageContext<'_>) {
        let (from, to) = match self.effect {
            TransitionEffect::FadeIn => (0.0, 1.0),
            TransitionEffect::FadeOut => (1.0, 0.0),
        };
        let hook = RenderHook::Opacity {
            target: ctx.graph.root(),
            start: ctx.time,
            duration: self.duration,
            from,
            to,
        };
        hook.apply(ctx.time, ctx.graph);
        ctx.hooks.push(hook);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storyline_audio::AudioMixer;
    use storyline_screenplay::{DirectiveConfig, DirectiveOp, NodeConfig, SceneDefaults};
    use storyline_stage::TweenTimeline;

    use crate::context::SceneTimers;
    use crate::directive::Directive;

    fn run(graph: &mut SceneGraph, hooks: &mut Vec<RenderHook>, op: DirectiveOp, time: f64) {
        let mut directive =
            Directive::from_config(0, &DirectiveConfig::new(op), &SceneDefaults::default());
        directive.check(graph, "s").unwrap();
        let mut tweens = TweenTimeline::paused();
        let mut mixer = AudioMixer::new(1);
        let mut timers = SceneTimers::new();
        let mut ctx = StageContext {
            time,
            fps: 10,
            canvas: (8, 8),
            graph,
            tweens: &mut tweens,
            mixer: &mut mixer,
            timers: &mut timers,
            hooks,
        };
        directive.execute(&mut ctx).unwrap();
    }

    fn graph() -> SceneGraph {
        SceneGraph::build(&NodeConfig::container("root").child(NodeConfig::sprite("bg", "#808080")))
            .unwrap()
    }

    #[test]
    fn test_add_filter_replaces_same_kind() {
        let mut graph = graph();
        let mut hooks = vec![];
        for radius in [1.0, 3.0] {
            run(
                &mut graph,
                &mut hooks,
                DirectiveOp::AddFilter {
                    target: "bg".into(),
                    filter: FilterConfig::Blur { radius },
                },
                0.0,
            );
        }
        run(
            &mut graph,
            &mut hooks,
            DirectiveOp::AddFilter {
                target: "bg".into(),
                filter: FilterConfig::Sepia,
            },
            0.0,
        );

        let bg = graph.node(graph.find("bg").unwrap());
        assert_eq!(bg.filters, vec![Filter::Blur { radius: 3.0 }, Filter::Sepia]);

        run(
            &mut graph,
            &mut hooks,
            DirectiveOp::RemoveFilter {
                target: "bg".into(),
                filter: FilterKind::Blur,
            },
            0.0,
        );
        let bg = graph.node(graph.find("bg").unwrap());
        assert_eq!(bg.filters, vec![Filter::Sepia]);
    }

    #[test]
    fn test_bad_tint_rejected() {
        let mut directive = Directive::from_config(
            0,
            &DirectiveConfig::new(DirectiveOp::AddFilter {
                target: "bg".into(),
                filter: FilterConfig::Tint {
                    color: "orange".into(),
                    strength: 0.5,
                },
            }),
            &SceneDefaults::default(),
        );
        assert!(directive.check(&graph(), "s").is_err());
    }

    #[test]
    fn test_transition_installs_root_opacity_hook() {
        let mut graph = graph();
        let mut hooks = vec![];
        run(
            &mut graph,
            &mut hooks,
            DirectiveOp::Transition {
                effect: TransitionEffect::FadeIn,
                duration: 1.0,
            },
            2.0,
        );
        assert_eq!(hooks.len(), 1);
        assert_eq!(graph.node(graph.root()).alpha, 0.0);

        hooks[0].apply(2.5, &mut graph);
        assert!((graph.node(graph.root()).alpha - 0.5).abs() < 1e-6);
    }
}
