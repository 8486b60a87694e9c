//! Screenplay compilation.
//!
//! Compiling turns the authored screenplay into a [`Schedule`]: one
//! [`CompiledScene`] per scene with its scene graph built, every directive
//! checked and loaded, and absolute execute times assigned. Nothing here
//! renders or plays; the director performs the schedule.

use storyline_common::clock::frame_boundary;
use storyline_common::error::{StorylineError, StorylineResult};
use storyline_screenplay::{Screenplay, ScreenplayConfig, Subtitle};
use storyline_stage::SceneGraph;

use crate::assets::AssetLoader;
use crate::directive::Directive;

/// A scene ready to be installed.
#[derive(Debug)]
pub struct CompiledScene {
    pub name: String,
    pub graph: SceneGraph,
    pub directives: Vec<Directive>,
    /// Performance time the scene starts at (seconds).
    pub start: f64,
    /// Performance time the scene ends at (seconds).
    pub end: f64,
    /// First frame owned by the scene.
    pub first_frame: u64,
    /// One past the last frame owned by the scene.
    pub end_frame: u64,
}

impl CompiledScene {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    pub fn frame_count(&self) -> u64 {
        self.end_frame.saturating_sub(self.first_frame)
    }
}

/// Result of compiling a screenplay.
#[derive(Debug)]
pub struct Schedule {
    pub config: ScreenplayConfig,
    pub scenes: Vec<CompiledScene>,
    /// One cue per non-empty speak directive, in performance order.
    pub subtitles: Vec<Subtitle>,
    pub duration: f64,
    pub total_frames: u64,
}

impl Schedule {
    pub fn fps(&self) -> u32 {
        self.config.fps
    }
}

/// Compile every scene of `screenplay`, loading assets through `assets`.
pub async fn compile(screenplay: &Screenplay, assets: &dyn AssetLoader) -> StorylineResult<Schedule> {
    let issues = screenplay.validate();
    if !issues.is_empty() {
        return Err(StorylineError::screenplay(issues.join("; ")));
    }

    let fps = screenplay.config.fps;
    let mut scenes = Vec::with_capacity(screenplay.scenes.len());
    let mut subtitles = vec![];
    let mut start = 0.0;

    for script in &screenplay.scenes {
        let mut graph = SceneGraph::build(&script.root).map_err(|e| match e {
            StorylineError::Screenplay { message } => {
                StorylineError::screenplay(format!("scene '{}': {message}", script.name))
            }
            other => other,
        })?;
        graph.hide_scene_children();

        for (node, key) in graph.pending_sources() {
            let source = assets.load_source(&key).await?;
            graph.node_mut(node).set_source(source, start);
        }

        let mut elapsed = 0.0;
        let mut directives = Vec::with_capacity(script.directives.len());
        for (index, config) in script.directives.iter().enumerate() {
            let mut directive = Directive::from_config(index, config, &script.defaults);
            directive.core_mut().execute_time = start + elapsed;
            directive.check(&graph, &script.name)?;
            directive.load(assets).await?;

            if let Some(cue) = directive.subtitle() {
                subtitles.push(cue);
            }
            if directive.core().sequential {
                elapsed += directive.duration();
            }
            directives.push(directive);
        }

        let end = start + elapsed + script.defaults.end_interval_secs;
        tracing::debug!(
            scene = %script.name,
            start,
            end,
            directives = directives.len(),
            "Compiled scene"
        );
        scenes.push(CompiledScene {
            name: script.name.clone(),
            graph,
            directives,
            start,
            end,
            first_frame: frame_boundary(start, fps),
            end_frame: frame_boundary(end, fps),
        });
        start = end;
    }

    let schedule = Schedule {
        config: screenplay.config.clone(),
        scenes,
        subtitles,
        duration: start,
        total_frames: frame_boundary(start, fps),
    };
    tracing::info!(
        scenes = schedule.scenes.len(),
        duration = schedule.duration,
        frames = schedule.total_frames,
        "Compiled screenplay"
    );
    Ok(schedule)
}
