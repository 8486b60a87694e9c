//! Execution context handed to directives.

use storyline_audio::AudioMixer;
use storyline_stage::{NodeId, RenderHook, SceneGraph, TweenTimeline};

/// Deferred side effect owned by the active scene.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerAction {
    StopSound(String),
}

/// Per-scene timers, fired by the director at frame boundaries and dropped
/// when the scene is uninstalled.
#[derive(Debug, Default)]
pub struct SceneTimers {
    pending: Vec<(f64, TimerAction)>,
}

impl SceneTimers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, at: f64, action: TimerAction) {
        self.pending.push((at, action));
    }

    /// Remove and return every action due at `time`, in scheduling order.
    ///
    /// An action is due once `time` is within `tolerance` of its deadline.
    pub fn take_due(&mut self, time: f64, tolerance: f64) -> Vec<TimerAction> {
        let mut due = vec![];
        self.pending.retain(|(at, action)| {
            if time - at >= -tolerance - 1e-9 {
                due.push(action.clone());
                false
            } else {
                true
            }
        });
        due
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Everything a directive may touch when it executes.
pub struct StageContext<'a> {
    /// Clock time of the frame that dispatched the directive.
    pub time: f64,
    pub fps: u32,
    /// Canvas size in pixels.
    pub canvas: (u32, u32),
    pub graph: &'a mut SceneGraph,
    pub tweens: &'a mut TweenTimeline,
    pub mixer: &'a mut AudioMixer,
    pub timers: &'a mut SceneTimers,
    pub hooks: &'a mut Vec<RenderHook>,
}

impl StageContext<'_> {
    /// Make a node and every ancestor up to the scene root visible.
    pub fn reveal(&mut self, id: NodeId) {
        let mut current = Some(id);
        while let Some(node_id) = current {
            let node = self.graph.node_mut(node_id);
            node.visible = true;
            current = node.parent;
        }
    }
}
