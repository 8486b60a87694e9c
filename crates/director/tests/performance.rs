//! End-to-end performances through the director with in-memory sinks.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use image::{Rgba, RgbaImage};
use storyline_audio::AudioBuffer;
use storyline_common::error::{StorylineError, StorylineResult};
use storyline_director::{Director, MemoryAssetLoader};
use storyline_render_engine::{
    EncoderConfig, Frame, InMemorySink, MediaBlob, MediaEncoder, SinkOutput, Synthesizer,
    SynthesizerSettings,
};
use storyline_screenplay::{
    DirectiveConfig, DirectiveOp, Easing, NodeConfig, SceneScript, Screenplay, ScreenplayConfig,
    TransitionEffect,
};
use storyline_stage::FlatRenderer;

const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);

fn config() -> ScreenplayConfig {
    ScreenplayConfig {
        width: 8,
        height: 8,
        fps: 10,
        background: "#000000".into(),
        sample_rate: 100,
        channels: 1,
    }
}

fn stage() -> NodeConfig {
    NodeConfig::container("root")
        .at(0.0, 0.0, 8.0, 8.0)
        .child(NodeConfig::sprite("hero", "#ff0000").at(0.0, 0.0, 8.0, 8.0))
        .child(NodeConfig::text("dialog").at(0.0, 0.0, 8.0, 8.0))
}

fn wait(secs: f64) -> DirectiveConfig {
    DirectiveConfig::new(DirectiveOp::Wait { duration: secs })
}

fn play(sound: &str, until_end: bool, sequential: bool) -> DirectiveConfig {
    let op = DirectiveOp::Play {
        sound: sound.into(),
        start: 0.0,
        looping: false,
        volume: 1.0,
        until_end,
    };
    if sequential {
        DirectiveConfig::new(op)
    } else {
        DirectiveConfig::parallel(op)
    }
}

fn tone(secs: f64) -> AudioBuffer {
    AudioBuffer::new(100, vec![vec![0.5; (secs * 100.0).round() as usize]])
}

async fn director(assets: MemoryAssetLoader) -> Director {
    let mut director = Director::new(
        Box::new(FlatRenderer::with_background(8, 8, "#000000").unwrap()),
        Arc::new(assets),
    );
    director.connect(Box::new(InMemorySink::new())).await.unwrap();
    director
}

fn frames(output: Option<SinkOutput>) -> Vec<Frame> {
    match output {
        Some(SinkOutput::Memory { frames }) => frames,
        other => panic!("unexpected sink output: {other:?}"),
    }
}

fn hears(frame: &Frame, sound: &str) -> bool {
    frame.audio.iter().any(|chunk| chunk.source == sound)
}

#[tokio::test]
async fn test_second_scene_sound_covers_its_frames() {
    let screenplay = Screenplay::new("ab", config())
        .scene(SceneScript::new("a", stage()).directive(wait(1.0)))
        .scene(SceneScript::new("b", stage()).directive(play("x", false, true)));
    let mut director = director(MemoryAssetLoader::new().with_sound("x", tone(2.0))).await;

    let performance = director.action(&screenplay).await.unwrap();
    assert!(performance.completed);
    assert!((performance.duration - 3.0).abs() < 1e-9);
    assert_eq!(performance.frames_rendered, 30);

    let frames = frames(performance.result);
    assert_eq!(frames.len(), 30);
    for frame in &frames {
        assert_eq!(hears(frame, "x"), frame.index >= 10, "frame {}", frame.index);
        assert!((frame.timestamp - frame.index as f64 / 10.0).abs() < 1e-9);
        for chunk in &frame.audio {
            assert_eq!(chunk.buffer.frames(), 10);
        }
    }
}

#[tokio::test]
async fn test_cut_stops_at_frame_boundary_and_finishes_sink() {
    let screenplay =
        Screenplay::new("long", config()).scene(SceneScript::new("s", stage()).directive(wait(3.0)));
    let mut director = director(MemoryAssetLoader::new()).await;
    let handle = director.cut_handle();
    director.on_progress(move |p| {
        if p.frame == 4 {
            handle.cut();
        }
    });

    let performance = director.action(&screenplay).await.unwrap();
    assert!(!performance.completed);
    assert_eq!(performance.frames_rendered, 5);
    assert_eq!(frames(performance.result).len(), 5);

    // A fresh run is not affected by the previous cut.
    director.on_progress(|_| {});
    let again = director.action(&screenplay).await.unwrap();
    assert!(again.completed);
    assert_eq!(again.frames_rendered, 30);
}

#[tokio::test]
async fn test_compile_error_names_scene_and_directive() {
    let screenplay = Screenplay::new("bad", config()).scene(
        SceneScript::new("intro", stage())
            .directive(wait(0.5))
            .directive(DirectiveConfig::new(DirectiveOp::Fade {
                target: "ghost".into(),
                to: 0.0,
                duration: 1.0,
                easing: Easing::Linear,
            })),
    );
    let mut director = director(MemoryAssetLoader::new()).await;

    match director.action(&screenplay).await {
        Err(StorylineError::Compile {
            scene,
            directive,
            kind,
            ..
        }) => {
            assert_eq!(scene, "intro");
            assert_eq!(directive, 1);
            assert_eq!(kind, "fade");
        }
        other => panic!("unexpected: {other:?}"),
    }
    assert_eq!(director.clock().listener_count(), 0);
}

#[tokio::test]
async fn test_directive_on_half_frame_tie_fires_once_on_earlier_frame() {
    let screenplay = Screenplay::new("tie", config()).scene(
        SceneScript::new("s", stage())
            .directive(wait(0.05))
            .directive(DirectiveConfig::new(DirectiveOp::Show {
                target: "hero".into(),
                duration: 0.0,
            }))
            .directive(wait(0.45)),
    );
    let mut director = director(MemoryAssetLoader::new()).await;

    let frames = frames(director.action(&screenplay).await.unwrap().result);
    assert_eq!(frames.len(), 5);
    for frame in &frames {
        assert_eq!(*frame.image.get_pixel(4, 4), RED, "frame {}", frame.index);
    }
}

#[tokio::test]
async fn test_directives_wait_for_their_frame() {
    let screenplay = Screenplay::new("later", config()).scene(
        SceneScript::new("s", stage())
            .directive(wait(0.3))
            .directive(DirectiveConfig::new(DirectiveOp::Show {
                target: "hero".into(),
                duration: 0.0,
            }))
            .directive(wait(0.2)),
    );
    let mut director = director(MemoryAssetLoader::new()).await;

    let frames = frames(director.action(&screenplay).await.unwrap().result);
    let lit: Vec<bool> = frames.iter().map(|f| *f.image.get_pixel(4, 4) == RED).collect();
    assert_eq!(lit, vec![false, false, false, true, true]);
}

#[tokio::test]
async fn test_speak_duration_and_subtitles() {
    let screenplay = Screenplay::new("talk", config()).scene(
        SceneScript::new("s", stage()).directive(DirectiveConfig::new(DirectiveOp::Speak {
            target: "dialog".into(),
            text: "你好hello".into(),
            speaker: None,
            voice: None,
            wpm: Some(600.0),
            mode: None,
        })),
    );
    let mut director = director(MemoryAssetLoader::new()).await;

    let performance = director.action(&screenplay).await.unwrap();
    assert!((performance.duration - 0.8).abs() < 1e-9);
    assert_eq!(performance.frames_rendered, 8);
    assert_eq!(performance.subtitles.len(), 1);
    assert_eq!(performance.subtitles[0].start, 0.0);
    assert!((performance.subtitles[0].end - 0.8).abs() < 1e-9);
    assert_eq!(performance.subtitles[0].text, "你好hello");
}

#[tokio::test]
async fn test_every_speak_line_yields_a_subtitle() {
    let speak = |text: &str| {
        DirectiveConfig::new(DirectiveOp::Speak {
            target: "dialog".into(),
            text: text.into(),
            speaker: None,
            voice: None,
            wpm: Some(600.0),
            mode: None,
        })
    };
    let screenplay = Screenplay::new("lines", config()).scene(
        SceneScript::new("s", stage())
            .directive(speak("hello"))
            .directive(speak(""))
            .directive(speak("bye")),
    );
    let mut director = director(MemoryAssetLoader::new()).await;

    let performance = director.action(&screenplay).await.unwrap();
    let cues = &performance.subtitles;
    assert_eq!(cues.len(), 3);
    assert!((cues[0].end - 0.6).abs() < 1e-9);
    assert!((cues[1].start - 0.6).abs() < 1e-9);
    assert_eq!(cues[1].start, cues[1].end);
    assert!(cues[1].text.is_empty());
    assert!((cues[2].start - 0.6).abs() < 1e-9);
    assert!((cues[2].end - 1.2).abs() < 1e-9);
}

#[tokio::test]
async fn test_until_end_sound_survives_scene_change() {
    let screenplay = Screenplay::new("music", config())
        .scene(
            SceneScript::new("a", stage())
                .directive(play("bgm", true, false))
                .directive(play("sfx", false, false))
                .directive(wait(0.5)),
        )
        .scene(SceneScript::new("b", stage()).directive(wait(0.5)));
    let assets = MemoryAssetLoader::new()
        .with_sound("bgm", tone(5.0))
        .with_sound("sfx", tone(5.0));
    let mut director = director(assets).await;

    let frames = frames(director.action(&screenplay).await.unwrap().result);
    assert_eq!(frames.len(), 10);
    assert!(frames[..5].iter().all(|f| hears(f, "bgm") && hears(f, "sfx")));
    assert!(frames[5..].iter().all(|f| hears(f, "bgm") && !hears(f, "sfx")));
}

#[tokio::test]
async fn test_trailing_directive_is_flushed_at_scene_end() {
    let screenplay = Screenplay::new("tail", config())
        .scene(
            SceneScript::new("a", stage())
                .directive(wait(0.5))
                .directive(play("x", true, false)),
        )
        .scene(SceneScript::new("b", stage()).directive(wait(0.3)));
    let mut director = director(MemoryAssetLoader::new().with_sound("x", tone(1.0))).await;

    let performance = director.action(&screenplay).await.unwrap();
    assert!(performance.completed);
    let frames = frames(performance.result);
    assert_eq!(frames.len(), 8);
    assert!(frames[..5].iter().all(|f| !hears(f, "x")));
    assert!(frames[5..].iter().all(|f| hears(f, "x")));
}

#[tokio::test]
async fn test_transition_fades_scene_in() {
    let screenplay = Screenplay::new("fade", config()).scene(
        SceneScript::new("s", stage())
            .directive(DirectiveConfig::parallel(DirectiveOp::Show {
                target: "hero".into(),
                duration: 0.0,
            }))
            .directive(DirectiveConfig::new(DirectiveOp::Transition {
                effect: TransitionEffect::FadeIn,
                duration: 1.0,
            })),
    );
    let mut director = director(MemoryAssetLoader::new()).await;

    let frames = frames(director.action(&screenplay).await.unwrap().result);
    assert_eq!(frames.len(), 10);
    assert_eq!(*frames[0].image.get_pixel(4, 4), BLACK);
    let mid = frames[5].image.get_pixel(4, 4)[0];
    assert!((120..=135).contains(&mid), "red channel at t=0.5 was {mid}");
    assert!(frames[9].image.get_pixel(4, 4)[0] > mid);
}

#[derive(Debug, Default)]
struct EncoderLog {
    video_frames: usize,
    aborted: bool,
    finalized: bool,
}

struct FailingEncoder {
    log: Arc<Mutex<EncoderLog>>,
    fail_at: usize,
}

#[async_trait::async_trait]
impl MediaEncoder for FailingEncoder {
    async fn configure(&mut self, _config: &EncoderConfig) -> StorylineResult<()> {
        Ok(())
    }

    async fn encode_video(&mut self, _image: &RgbaImage, _ts: f64, _key: bool) -> StorylineResult<()> {
        let mut log = self.log.lock().unwrap();
        if log.video_frames == self.fail_at {
            return Err(StorylineError::encode("pipe closed"));
        }
        log.video_frames += 1;
        Ok(())
    }

    async fn encode_audio(&mut self, _ts: f64, _samples: &[f32]) -> StorylineResult<()> {
        Ok(())
    }

    async fn flush(&mut self) -> StorylineResult<()> {
        Ok(())
    }

    async fn finalize(&mut self) -> StorylineResult<MediaBlob> {
        self.log.lock().unwrap().finalized = true;
        Ok(MediaBlob {
            path: PathBuf::from("out.mp4"),
            mime_type: "video/mp4".into(),
            size_bytes: 0,
        })
    }

    async fn abort(&mut self) {
        self.log.lock().unwrap().aborted = true;
    }
}

fn settings() -> SynthesizerSettings {
    SynthesizerSettings {
        video_codec: "h264".into(),
        video_bitrate_kbps: 500,
        audio_bitrate_kbps: 64,
        keyframe_interval: 10,
        audio_enabled: true,
    }
}

#[tokio::test]
async fn test_encoder_failure_fails_run_and_aborts() {
    let log = Arc::new(Mutex::new(EncoderLog::default()));
    let encoder = FailingEncoder {
        log: Arc::clone(&log),
        fail_at: 3,
    };
    let screenplay =
        Screenplay::new("enc", config()).scene(SceneScript::new("s", stage()).directive(wait(1.0)));
    let mut director = director(MemoryAssetLoader::new()).await;
    director
        .connect(Box::new(Synthesizer::new(Box::new(encoder), settings())))
        .await
        .unwrap();

    match director.action(&screenplay).await {
        Err(e) => assert!(e.is_encode(), "unexpected error: {e}"),
        Ok(p) => panic!("run should fail, got {p:?}"),
    }
    let log = log.lock().unwrap();
    assert_eq!(log.video_frames, 3);
    assert!(log.aborted);
    assert!(!log.finalized);
}

#[tokio::test]
async fn test_synthesizer_run_produces_media() {
    let log = Arc::new(Mutex::new(EncoderLog::default()));
    let encoder = FailingEncoder {
        log: Arc::clone(&log),
        fail_at: usize::MAX,
    };
    let screenplay =
        Screenplay::new("enc", config()).scene(SceneScript::new("s", stage()).directive(wait(1.0)));
    let mut director = director(MemoryAssetLoader::new()).await;
    director
        .connect(Box::new(Synthesizer::new(Box::new(encoder), settings())))
        .await
        .unwrap();

    let performance = director.action(&screenplay).await.unwrap();
    assert!(performance.result.as_ref().and_then(|r| r.media()).is_some());
    let log = log.lock().unwrap();
    assert_eq!(log.video_frames, 10);
    assert!(log.finalized);
    assert!(!log.aborted);
}
