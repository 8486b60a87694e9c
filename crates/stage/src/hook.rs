//! Per-frame render hooks.
//!
//! Unlike tweens, hooks stay attached for the rest of the scene and are
//! re-applied on every frame, holding their final value once finished.

use storyline_screenplay::Easing;

use crate::scene::{NodeId, NodeProperty, SceneGraph};

/// Callback applied to the scene graph right before each render.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderHook {
    /// Drive a node's opacity from `from` to `to` over `[start, start + duration]`.
    Opacity {
        target: NodeId,
        start: f64,
        duration: f64,
        from: f32,
        to: f32,
    },
}

impl RenderHook {
    pub fn apply(&self, time: f64, graph: &mut SceneGraph) {
        match *self {
            RenderHook::Opacity {
                target,
                start,
                duration,
                from,
                to,
            } => {
                if time + 1e-9 < start {
                    return;
                }
                let progress = if duration <= 0.0 {
                    1.0
                } else {
                    (time - start) / duration
                };
                let eased = Easing::Linear.apply(progress) as f32;
                graph
                    .node_mut(target)
                    .set_property(NodeProperty::Alpha, from + (to - from) * eased);
            }
        }
    }
}
