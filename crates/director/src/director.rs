//! The performance driver.
//!
//! A [`Director`] owns the frame clock, the mixer, the tween timeline and the
//! active scene. [`Director::action`] compiles a screenplay and then walks
//! the clock frame by frame: due directives are dispatched, the scene is
//! composed into a [`Frame`], and the frame is handed to the connected
//! [`FrameSink`]. Each frame is fully awaited before the clock moves again.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use storyline_audio::AudioMixer;
use storyline_common::clock::FrameClock;
use storyline_common::error::{StorylineError, StorylineResult};
use storyline_render_engine::{Frame, FrameSink, SinkConfig, SinkOutput};
use storyline_screenplay::{Screenplay, Subtitle};
use storyline_stage::{RenderHook, Renderer, TweenTimeline};

use crate::assets::AssetLoader;
use crate::context::{SceneTimers, StageContext, TimerAction};
use crate::schedule::{compile, CompiledScene, Schedule};

/// Progress callback invoked after every frame.
pub type ProgressCallback = Box<dyn Fn(Progress) + Send>;

/// Progress report for a running performance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    /// Completion in percent [0.0, 100.0].
    pub percent: f64,
    /// Clock time of the frame just produced.
    pub current_time: f64,
    /// Total performance length in seconds.
    pub duration: f64,
    pub frame: u64,
    pub total_frames: u64,
}

/// Outcome of [`Director::action`].
#[derive(Debug)]
pub struct Performance {
    /// Terminal result of the sink.
    pub result: Option<SinkOutput>,
    pub subtitles: Vec<Subtitle>,
    /// False when the run was cut short.
    pub completed: bool,
    pub frames_rendered: u64,
    pub duration: f64,
}

/// Shared flag that stops a running performance at the next frame boundary.
#[derive(Debug, Clone, Default)]
pub struct CutHandle(Arc<AtomicBool>);

impl CutHandle {
    pub fn cut(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cut(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Per-frame clock listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickListener {
    /// Run the active scene's directive at this index once it is due.
    Dispatch(usize),
    /// Render the scene and collect the frame's audio.
    Compose,
}

struct RunSummary {
    frames: u64,
    completed: bool,
}

/// Drives a screenplay through a renderer into a sink.
pub struct Director {
    renderer: Box<dyn Renderer>,
    assets: Arc<dyn AssetLoader>,
    sink: Option<Box<dyn FrameSink>>,
    clock: FrameClock<TickListener>,
    mixer: AudioMixer,
    tweens: TweenTimeline,
    timers: SceneTimers,
    hooks: Vec<RenderHook>,
    active: Option<CompiledScene>,
    cut: CutHandle,
    progress: Option<ProgressCallback>,
}

impl Director {
    pub fn new(renderer: Box<dyn Renderer>, assets: Arc<dyn AssetLoader>) -> Self {
        Self {
            renderer,
            assets,
            sink: None,
            clock: FrameClock::new(1),
            mixer: AudioMixer::default(),
            tweens: TweenTimeline::paused(),
            timers: SceneTimers::new(),
            hooks: vec![],
            active: None,
            cut: CutHandle::default(),
            progress: None,
        }
    }

    /// Attach the sink for the next performance, disconnecting any previous one.
    pub async fn connect(&mut self, sink: Box<dyn FrameSink>) -> StorylineResult<()> {
        if let Some(mut previous) = self.sink.take() {
            tracing::debug!(sink = previous.name(), "Replacing sink");
            previous.disconnect().await?;
        }
        tracing::debug!(sink = sink.name(), "Connected sink");
        self.sink = Some(sink);
        Ok(())
    }

    /// Detach and return the current sink.
    pub async fn disconnect(&mut self) -> StorylineResult<Option<Box<dyn FrameSink>>> {
        match self.sink.take() {
            Some(mut sink) => {
                sink.disconnect().await?;
                Ok(Some(sink))
            }
            None => Ok(None),
        }
    }

    /// Compile without performing.
    pub async fn compile(&self, screenplay: &Screenplay) -> StorylineResult<Schedule> {
        compile(screenplay, self.assets.as_ref()).await
    }

    pub fn on_progress(&mut self, callback: impl Fn(Progress) + Send + 'static) {
        self.progress = Some(Box::new(callback));
    }

    /// Handle that can stop a running performance from elsewhere.
    pub fn cut_handle(&self) -> CutHandle {
        self.cut.clone()
    }

    /// Stop the running performance at the next frame boundary.
    pub fn cut(&self) {
        self.cut.cut();
    }

    pub fn clock(&self) -> &FrameClock<TickListener> {
        &self.clock
    }

    /// Drop all runtime state: listeners, sounds, tweens, timers, hooks and
    /// the active scene. The connected sink is kept.
    pub fn reset(&mut self) {
        self.clock.reset();
        self.mixer.reset();
        self.tweens.clear();
        self.timers.clear();
        self.hooks.clear();
        self.active = None;
    }

    /// Compile and perform `screenplay` into the connected sink.
    ///
    /// The sink is always finished, even when the run fails or is cut.
    /// A cut run resolves to `Ok` with `completed == false`.
    pub async fn action(&mut self, screenplay: &Screenplay) -> StorylineResult<Performance> {
        let schedule = match self.compile(screenplay).await {
            Ok(schedule) => schedule,
            Err(e) => {
                tracing::error!(error = %e, "Compilation failed");
                self.reset();
                return Err(e);
            }
        };
        self.run_schedule(schedule, &screenplay.name).await
    }

    /// Perform an already compiled schedule; `action` without the compile.
    async fn run_schedule(&mut self, schedule: Schedule, name: &str) -> StorylineResult<Performance> {
        let config = &schedule.config;
        if self.renderer.dimensions() != (config.width, config.height) {
            self.reset();
            return Err(StorylineError::config(format!(
                "renderer is {:?} but the screenplay canvas is {}x{}",
                self.renderer.dimensions(),
                config.width,
                config.height
            )));
        }
        let mut sink = self
            .sink
            .take()
            .ok_or_else(|| StorylineError::config("no sink connected"))?;

        let sink_config = SinkConfig {
            width: config.width,
            height: config.height,
            fps: config.fps,
            sample_rate: config.sample_rate,
            channels: config.channels,
            duration_secs: schedule.duration,
            total_frames: schedule.total_frames,
        };
        self.cut.clear();
        self.clock = FrameClock::new(config.fps);
        self.mixer = AudioMixer::new(config.channels as usize);

        tracing::info!(
            screenplay = %name,
            sink = sink.name(),
            frames = schedule.total_frames,
            duration = schedule.duration,
            "Action"
        );

        let Schedule {
            scenes,
            subtitles,
            duration,
            total_frames,
            ..
        } = schedule;

        let run = match sink.connect(&sink_config).await {
            Ok(()) => self.perform(scenes, sink.as_mut(), total_frames, duration).await,
            Err(e) => Err(e),
        };
        let finished = sink.finish().await;
        self.sink = Some(sink);
        self.reset();

        match run {
            Ok(summary) => {
                let result = finished?;
                if summary.completed {
                    tracing::info!(frames = summary.frames, "Performance complete");
                } else {
                    tracing::warn!(frames = summary.frames, "Performance cut");
                }
                Ok(Performance {
                    result: Some(result),
                    subtitles,
                    completed: summary.completed,
                    frames_rendered: summary.frames,
                    duration,
                })
            }
            Err(e) => {
                if let Err(finish_error) = finished {
                    tracing::warn!(error = %finish_error, "Sink failed to finish after an earlier error");
                }
                tracing::error!(error = %e, "Performance failed");
                Err(e)
            }
        }
    }

    async fn perform(
        &mut self,
        scenes: Vec<CompiledScene>,
        sink: &mut dyn FrameSink,
        total_frames: u64,
        duration: f64,
    ) -> StorylineResult<RunSummary> {
        let mut frames = 0;
        for scene in scenes {
            let range = scene.first_frame..scene.end_frame;
            self.install(scene);

            let played = self.perform_scene(range, sink, &mut frames, total_frames, duration).await;
            let flushed = self.uninstall(matches!(played, Ok(true)));
            match played {
                Err(e) => return Err(e),
                Ok(false) => {
                    return Ok(RunSummary {
                        frames,
                        completed: false,
                    })
                }
                Ok(true) => flushed?,
            }
        }
        Ok(RunSummary {
            frames,
            completed: true,
        })
    }

    /// Returns whether every frame of the scene was produced.
    async fn perform_scene(
        &mut self,
        range: std::ops::Range<u64>,
        sink: &mut dyn FrameSink,
        frames: &mut u64,
        total_frames: u64,
        duration: f64,
    ) -> StorylineResult<bool> {
        let first_frame = range.start;
        for index in range {
            if self.cut.is_cut() {
                return Ok(false);
            }
            let frame = self.tick(index, first_frame).await?;
            let time = frame.timestamp;
            sink.handle(frame).await?;
            *frames += 1;

            if let Some(cb) = &self.progress {
                cb(Progress {
                    percent: if total_frames == 0 {
                        100.0
                    } else {
                        (index + 1) as f64 / total_frames as f64 * 100.0
                    },
                    current_time: time,
                    duration,
                    frame: index,
                    total_frames,
                });
            }
        }
        Ok(true)
    }

    fn install(&mut self, mut scene: CompiledScene) {
        self.mixer.reset_except_until_end();
        self.tweens.clear();
        self.timers.clear();
        self.hooks.clear();
        self.clock.clear_listeners();

        for (index, directive) in scene.directives.iter_mut().enumerate() {
            directive.schedule();
            self.clock.subscribe(TickListener::Dispatch(index));
        }
        self.clock.subscribe(TickListener::Compose);

        tracing::info!(
            scene = %scene.name,
            start = scene.start,
            end = scene.end,
            frames = scene.frame_count(),
            "Installed scene"
        );
        self.active = Some(scene);
    }

    /// Tear down the active scene. When `flush` is set, directives that
    /// never came due run now at their own execute time.
    fn uninstall(&mut self, flush: bool) -> StorylineResult<()> {
        let mut result = Ok(());
        if flush {
            let pending: Vec<usize> = self
                .clock
                .listeners()
                .filter_map(|(_, listener)| match listener {
                    TickListener::Dispatch(index) => Some(*index),
                    TickListener::Compose => None,
                })
                .collect();
            for index in pending {
                let Some(at) = self.execute_time(index) else {
                    continue;
                };
                tracing::debug!(directive = index, at, "Flushing directive at scene end");
                if let Err(e) = self.execute_directive(index, at) {
                    result = Err(e);
                    break;
                }
            }
        }

        self.clock.clear_listeners();
        self.timers.clear();
        self.hooks.clear();
        self.tweens.clear();
        if let Some(scene) = self.active.take() {
            tracing::debug!(scene = %scene.name, "Uninstalled scene");
        }
        result
    }

    async fn tick(&mut self, index: u64, first_frame: u64) -> StorylineResult<Frame> {
        let time = self.clock.advance(index);
        let tolerance = self.clock.tolerance();

        for action in self.timers.take_due(time, tolerance) {
            match action {
                TimerAction::StopSound(sound) => self.mixer.stop(&sound),
            }
        }

        let listeners: Vec<_> = self.clock.listeners().map(|(id, l)| (id, *l)).collect();
        let mut frame = None;
        for (id, listener) in listeners {
            match listener {
                TickListener::Dispatch(directive) => {
                    let Some(due) = self.execute_time(directive) else {
                        self.clock.unsubscribe(id);
                        continue;
                    };
                    let delta = time - due;
                    if delta < -tolerance - 1e-9 {
                        continue;
                    }
                    if delta > tolerance + 1e-9 && index > first_frame {
                        tracing::warn!(directive, due, time, "Directive dispatched late");
                    }
                    self.clock.unsubscribe(id);
                    self.execute_directive(directive, time)?;
                }
                TickListener::Compose => frame = Some(self.compose(index, time).await?),
            }
        }
        frame.ok_or_else(|| StorylineError::render(format!("no frame composed at tick {index}")))
    }

    fn execute_time(&self, directive: usize) -> Option<f64> {
        self.active
            .as_ref()
            .and_then(|scene| scene.directives.get(directive))
            .map(|d| d.core().execute_time)
    }

    fn execute_directive(&mut self, directive: usize, time: f64) -> StorylineResult<()> {
        let Some(scene) = self.active.as_mut() else {
            return Ok(());
        };
        let CompiledScene {
            graph, directives, ..
        } = scene;
        let Some(target) = directives.get_mut(directive) else {
            return Ok(());
        };
        let mut ctx = StageContext {
            time,
            fps: self.clock.fps(),
            canvas: self.renderer.dimensions(),
            graph,
            tweens: &mut self.tweens,
            mixer: &mut self.mixer,
            timers: &mut self.timers,
            hooks: &mut self.hooks,
        };
        target.execute(&mut ctx)
    }

    async fn compose(&mut self, index: u64, time: f64) -> StorylineResult<Frame> {
        let scene = self
            .active
            .as_mut()
            .ok_or_else(|| StorylineError::render("no active scene"))?;
        self.tweens.seek(time, &mut scene.graph);
        for hook in &self.hooks {
            hook.apply(time, &mut scene.graph);
        }
        self.mixer.update(time, self.clock.fps());
        let image = self.renderer.render(&scene.graph, time)?;
        let audio = self.mixer.get_audio_buffers().await?;
        Ok(Frame {
            index,
            timestamp: time,
            image,
            audio,
        })
    }
}
