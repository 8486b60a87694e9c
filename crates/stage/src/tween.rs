//! Seek-driven tween timeline.
//!
//! The timeline never advances on its own: the director seeks it to the
//! frame time before every render. Tweens are applied in insertion order, so
//! when two tweens drive the same property at once the later one wins.

use std::f64::consts::TAU;

use storyline_screenplay::Easing;

use crate::scene::{NodeId, NodeProperty, SceneGraph};

/// Oscillations per shake.
const SHAKE_CYCLES: f64 = 4.0;

/// How a tween moves its property.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TweenKind {
    /// From the property's value when the tween starts, to `to`.
    To {
        property: NodeProperty,
        to: f32,
        easing: Easing,
    },
    /// From an explicit value to `to`.
    FromTo {
        property: NodeProperty,
        from: f32,
        to: f32,
        easing: Easing,
    },
    /// Decaying horizontal oscillation around the node's position.
    Shake { amplitude: f32 },
}

/// Side effect fired when a tween starts or completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TweenAction {
    Show,
    Hide,
    RestoreOrigin,
}

impl TweenAction {
    fn apply(self, graph: &mut SceneGraph, target: NodeId) {
        let node = graph.node_mut(target);
        match self {
            TweenAction::Show => node.visible = true,
            TweenAction::Hide => node.visible = false,
            TweenAction::RestoreOrigin => node.restore_origin(),
        }
    }
}

/// A single property animation.
#[derive(Debug, Clone, PartialEq)]
pub struct Tween {
    pub target: NodeId,
    pub kind: TweenKind,
    pub duration: f64,
    pub on_start: Vec<TweenAction>,
    pub on_complete: Vec<TweenAction>,
}

impl Tween {
    pub fn to(target: NodeId, property: NodeProperty, to: f32, duration: f64, easing: Easing) -> Self {
        Self::new(
            target,
            TweenKind::To {
                property,
                to,
                easing,
            },
            duration,
        )
    }

    pub fn from_to(
        target: NodeId,
        property: NodeProperty,
        from: f32,
        to: f32,
        duration: f64,
        easing: Easing,
    ) -> Self {
        Self::new(
            target,
            TweenKind::FromTo {
                property,
                from,
                to,
                easing,
            },
            duration,
        )
    }

    pub fn shake(target: NodeId, amplitude: f32, duration: f64) -> Self {
        Self::new(target, TweenKind::Shake { amplitude }, duration)
    }

    fn new(target: NodeId, kind: TweenKind, duration: f64) -> Self {
        Self {
            target,
            kind,
            duration: duration.max(0.0),
            on_start: vec![],
            on_complete: vec![],
        }
    }

    pub fn on_start(mut self, action: TweenAction) -> Self {
        self.on_start.push(action);
        self
    }

    pub fn on_complete(mut self, action: TweenAction) -> Self {
        self.on_complete.push(action);
        self
    }
}

#[derive(Debug, Clone)]
struct ScheduledTween {
    tween: Tween,
    at: f64,
    from: f32,
    started: bool,
    done: bool,
}

/// Timeline of scheduled tweens, driven only by [`seek`](TweenTimeline::seek).
#[derive(Debug, Clone, Default)]
pub struct TweenTimeline {
    tweens: Vec<ScheduledTween>,
}

impl TweenTimeline {
    /// Create an empty timeline that moves only when seeked.
    pub fn paused() -> Self {
        Self::default()
    }

    /// Schedule `tween` to start at scene time `at`.
    pub fn add(&mut self, tween: Tween, at: f64) {
        self.tweens.push(ScheduledTween {
            tween,
            at,
            from: 0.0,
            started: false,
            done: false,
        });
    }

    /// Apply every tween that has started by `time`, then retire finished ones.
    ///
    /// Time is expected to be non-decreasing between calls.
    pub fn seek(&mut self, time: f64, graph: &mut SceneGraph) {
        for scheduled in self.tweens.iter_mut() {
            if time + 1e-9 < scheduled.at {
                continue;
            }

            let target = scheduled.tween.target;
            if !scheduled.started {
                for action in &scheduled.tween.on_start {
                    action.apply(graph, target);
                }
                scheduled.from = match scheduled.tween.kind {
                    TweenKind::To { property, .. } => graph.node(target).property(property),
                    TweenKind::FromTo { from, .. } => from,
                    TweenKind::Shake { .. } => 0.0,
                };
                scheduled.started = true;
            }

            let progress = if scheduled.tween.duration <= 0.0 {
                1.0
            } else {
                ((time - scheduled.at) / scheduled.tween.duration).clamp(0.0, 1.0)
            };

            let node = graph.node_mut(target);
            match scheduled.tween.kind {
                TweenKind::To {
                    property,
                    to,
                    easing,
                }
                | TweenKind::FromTo {
                    property,
                    to,
                    easing,
                    ..
                } => {
                    let eased = easing.apply(progress) as f32;
                    node.set_property(property, scheduled.from + (to - scheduled.from) * eased);
                }
                TweenKind::Shake { amplitude } => {
                    let offset = if progress >= 1.0 {
                        0.0
                    } else {
                        amplitude as f64 * (progress * TAU * SHAKE_CYCLES).sin() * (1.0 - progress)
                    };
                    node.set_property(NodeProperty::OffsetX, offset as f32);
                }
            }

            if progress >= 1.0 {
                tracing::trace!(node = ?target, at = scheduled.at, "Tween finished");
                for action in &scheduled.tween.on_complete {
                    action.apply(graph, target);
                }
                scheduled.done = true;
            }
        }

        self.tweens.retain(|t| !t.done);
    }

    pub fn clear(&mut self) {
        self.tweens.clear();
    }

    /// Tweens scheduled or still running.
    pub fn len(&self) -> usize {
        self.tweens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tweens.is_empty()
    }
}
