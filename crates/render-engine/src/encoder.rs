//! Encoder and muxer adapter.
//!
//! [`MediaEncoder`] is the narrow seam the synthesizer writes through.
//! [`FfmpegEncoder`] implements it with system `ffmpeg` processes: one child
//! encodes raw RGBA video from stdin, another encodes interleaved `f32le`
//! audio, and `finalize` muxes both into the output container with stream
//! copy.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use image::RgbaImage;
use storyline_common::error::{StorylineError, StorylineResult};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, Command};
use tokio::task::JoinHandle;

/// Video stream parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoEncoderConfig {
    /// Codec name (`h264`, `h265`, `vp9`, or an ffmpeg encoder name).
    pub codec: String,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub bitrate_kbps: u32,
    /// Frames between forced key frames.
    pub keyframe_interval: u32,
}

/// Audio stream parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioEncoderConfig {
    pub sample_rate: u32,
    pub channels: u16,
    pub bitrate_kbps: u32,
}

/// Full encoder setup. `audio: None` produces a video-only file.
#[derive(Debug, Clone, PartialEq)]
pub struct EncoderConfig {
    pub video: VideoEncoderConfig,
    pub audio: Option<AudioEncoderConfig>,
}

/// A finished media file.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaBlob {
    pub path: PathBuf,
    pub mime_type: String,
    pub size_bytes: u64,
}

/// Codec and muxer primitives.
#[async_trait::async_trait]
pub trait MediaEncoder: Send {
    /// Set up video and (optionally) audio streams wired to the container muxer.
    async fn configure(&mut self, config: &EncoderConfig) -> StorylineResult<()>;

    /// Submit one video sample.
    async fn encode_video(
        &mut self,
        image: &RgbaImage,
        timestamp: f64,
        key_frame: bool,
    ) -> StorylineResult<()>;

    /// Submit one interleaved block of audio samples.
    async fn encode_audio(&mut self, timestamp: f64, samples: &[f32]) -> StorylineResult<()>;

    /// Push everything submitted so far through the encoders.
    async fn flush(&mut self) -> StorylineResult<()>;

    /// Close the streams and write the container.
    async fn finalize(&mut self) -> StorylineResult<MediaBlob>;

    /// Drop all in-flight work without producing output.
    async fn abort(&mut self);
}

/// Output container, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    Mp4,
    Mov,
    Mkv,
}

impl Container {
    pub fn from_path(path: &Path) -> StorylineResult<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "mp4" | "m4v" => Ok(Container::Mp4),
            "mov" => Ok(Container::Mov),
            "mkv" => Ok(Container::Mkv),
            other => Err(StorylineError::unsupported(format!(
                "unsupported output container '{other}' (expected mp4, mov, or mkv)"
            ))),
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            Container::Mp4 => "video/mp4",
            Container::Mov => "video/quicktime",
            Container::Mkv => "video/x-matroska",
        }
    }

    fn faststart(self) -> bool {
        matches!(self, Container::Mp4 | Container::Mov)
    }
}

/// Map a codec name to the ffmpeg encoder that produces it.
pub fn ffmpeg_video_encoder(codec: &str) -> &str {
    match codec {
        "h264" | "avc" => "libx264",
        "h265" | "hevc" => "libx265",
        "vp9" => "libvpx-vp9",
        other => other,
    }
}

/// Check whether `binary` resolves on PATH.
pub async fn command_exists(binary: &str) -> bool {
    Command::new("sh")
        .arg("-c")
        .arg(format!("command -v {binary} >/dev/null 2>&1"))
        .status()
        .await
        .map(|status| status.success())
        .unwrap_or(false)
}

pub async fn is_ffmpeg_available() -> bool {
    command_exists("ffmpeg").await
}

/// A running ffmpeg child fed through stdin.
struct FfmpegProcess {
    label: &'static str,
    child: Child,
    stdin: Option<ChildStdin>,
    stderr: Option<JoinHandle<String>>,
}

impl FfmpegProcess {
    fn spawn(label: &'static str, args: &[String]) -> StorylineResult<Self> {
        tracing::debug!(label, ?args, "Spawning ffmpeg");
        let mut child = Command::new("ffmpeg")
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                StorylineError::encode(format!(
                    "failed to start ffmpeg {label} encoder (is it installed and on PATH?): {e}"
                ))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| StorylineError::encode(format!("failed to open ffmpeg {label} stdin")))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| StorylineError::encode(format!("failed to open ffmpeg {label} stderr")))?;

        // Drain stderr so ffmpeg never blocks on a full pipe.
        let drain = tokio::spawn(async move {
            let mut output = String::new();
            match stderr.read_to_string(&mut output).await {
                Ok(_) => output,
                Err(err) => format!("<failed to read ffmpeg stderr: {err}>"),
            }
        });

        Ok(Self {
            label,
            child,
            stdin: Some(stdin),
            stderr: Some(drain),
        })
    }

    async fn write(&mut self, bytes: &[u8]) -> StorylineResult<()> {
        let label = self.label;
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| StorylineError::encode(format!("ffmpeg {label} input already closed")))?;
        stdin
            .write_all(bytes)
            .await
            .map_err(|e| StorylineError::encode(format!("failed to write to ffmpeg {label}: {e}")))
    }

    async fn flush(&mut self) -> StorylineResult<()> {
        let label = self.label;
        if let Some(stdin) = self.stdin.as_mut() {
            stdin
                .flush()
                .await
                .map_err(|e| StorylineError::encode(format!("failed to flush ffmpeg {label}: {e}")))?;
        }
        Ok(())
    }

    /// Close stdin and wait for a clean exit.
    async fn close(mut self) -> StorylineResult<()> {
        drop(self.stdin.take());
        let status = self.child.wait().await.map_err(|e| {
            StorylineError::encode(format!("failed to wait for ffmpeg {}: {e}", self.label))
        })?;
        let stderr = match self.stderr.take() {
            Some(handle) => handle
                .await
                .unwrap_or_else(|_| "<failed to join stderr reader>".to_string()),
            None => String::new(),
        };
        if !status.success() {
            return Err(StorylineError::encode(format!(
                "ffmpeg {} exited with status {}: {}",
                self.label,
                status,
                stderr.trim()
            )));
        }
        Ok(())
    }

    async fn kill(mut self) {
        drop(self.stdin.take());
        if let Err(err) = self.child.kill().await {
            tracing::debug!(label = self.label, error = %err, "ffmpeg already exited");
        }
        if let Some(handle) = self.stderr.take() {
            handle.abort();
        }
    }
}

struct Session {
    container: Container,
    workdir: TempDir,
    video: FfmpegProcess,
    audio: Option<FfmpegProcess>,
    frame_bytes: usize,
    last_video_ts: Option<f64>,
}

impl Session {
    fn video_path(&self) -> PathBuf {
        self.workdir.path().join("video.mkv")
    }

    fn audio_path(&self) -> PathBuf {
        self.workdir.path().join("audio.m4a")
    }
}

/// [`MediaEncoder`] backed by system ffmpeg processes.
pub struct FfmpegEncoder {
    output: PathBuf,
    session: Option<Session>,
}

impl FfmpegEncoder {
    pub fn new(output: impl Into<PathBuf>) -> Self {
        Self {
            output: output.into(),
            session: None,
        }
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    fn session_mut(&mut self) -> StorylineResult<&mut Session> {
        self.session
            .as_mut()
            .ok_or_else(|| StorylineError::encode("ffmpeg encoder is not configured"))
    }
}

/// Arguments for the video child: raw RGBA on stdin into a video-only file.
pub fn video_args(config: &VideoEncoderConfig, out: &Path) -> Vec<String> {
    vec![
        "-y".into(),
        "-loglevel".into(),
        "error".into(),
        "-f".into(),
        "rawvideo".into(),
        "-pix_fmt".into(),
        "rgba".into(),
        "-s".into(),
        format!("{}x{}", config.width, config.height),
        "-r".into(),
        config.fps.to_string(),
        "-i".into(),
        "pipe:0".into(),
        "-c:v".into(),
        ffmpeg_video_encoder(&config.codec).to_string(),
        "-pix_fmt".into(),
        "yuv420p".into(),
        "-b:v".into(),
        format!("{}k", config.bitrate_kbps),
        "-force_key_frames".into(),
        format!("expr:eq(mod(n,{}),0)", config.keyframe_interval.max(1)),
        out.to_string_lossy().into_owned(),
    ]
}

/// Arguments for the audio child: interleaved `f32le` on stdin into AAC.
pub fn audio_args(config: &AudioEncoderConfig, out: &Path) -> Vec<String> {
    vec![
        "-y".into(),
        "-loglevel".into(),
        "error".into(),
        "-f".into(),
        "f32le".into(),
        "-ar".into(),
        config.sample_rate.to_string(),
        "-ac".into(),
        config.channels.to_string(),
        "-i".into(),
        "pipe:0".into(),
        "-c:a".into(),
        "aac".into(),
        "-b:a".into(),
        format!("{}k", config.bitrate_kbps),
        out.to_string_lossy().into_owned(),
    ]
}

/// Arguments for the final stream-copy mux.
pub fn mux_args(video: &Path, audio: Option<&Path>, container: Container, out: &Path) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "-y".into(),
        "-loglevel".into(),
        "error".into(),
        "-i".into(),
        video.to_string_lossy().into_owned(),
    ];
    if let Some(audio) = audio {
        args.extend([
            "-i".into(),
            audio.to_string_lossy().into_owned(),
            "-map".into(),
            "0:v:0".into(),
            "-map".into(),
            "1:a:0".into(),
        ]);
    }
    args.extend(["-c".into(), "copy".into()]);
    if container.faststart() {
        args.extend(["-movflags".into(), "+faststart".into()]);
    }
    args.push(out.to_string_lossy().into_owned());
    args
}

#[async_trait::async_trait]
impl MediaEncoder for FfmpegEncoder {
    async fn configure(&mut self, config: &EncoderConfig) -> StorylineResult<()> {
        let video = &config.video;
        if video.width == 0 || video.height == 0 {
            return Err(StorylineError::encode("video width/height must be non-zero"));
        }
        if video.width % 2 != 0 || video.height % 2 != 0 {
            return Err(StorylineError::encode(
                "video width/height must be even (required for yuv420p output)",
            ));
        }
        if let Some(audio) = &config.audio {
            if audio.sample_rate == 0 || audio.channels == 0 {
                return Err(StorylineError::encode(
                    "audio sample rate and channel count must be non-zero",
                ));
            }
        }
        let container = Container::from_path(&self.output)?;

        if !is_ffmpeg_available().await {
            return Err(StorylineError::encode(
                "ffmpeg is required for export, but was not found on PATH",
            ));
        }

        let workdir = tempfile::Builder::new()
            .prefix("storyline-encode-")
            .tempdir()
            .map_err(|e| StorylineError::encode(format!("failed to create scratch directory: {e}")))?;

        let video_out = workdir.path().join("video.mkv");
        let video_proc = FfmpegProcess::spawn("video", &video_args(video, &video_out))?;
        let audio_proc = match &config.audio {
            Some(audio) => {
                let audio_out = workdir.path().join("audio.m4a");
                Some(FfmpegProcess::spawn("audio", &audio_args(audio, &audio_out))?)
            }
            None => None,
        };

        tracing::info!(
            output = %self.output.display(),
            codec = %video.codec,
            width = video.width,
            height = video.height,
            fps = video.fps,
            audio = config.audio.is_some(),
            "ffmpeg encoder configured"
        );

        self.session = Some(Session {
            container,
            workdir,
            video: video_proc,
            audio: audio_proc,
            frame_bytes: video.width as usize * video.height as usize * 4,
            last_video_ts: None,
        });
        Ok(())
    }

    async fn encode_video(
        &mut self,
        image: &RgbaImage,
        timestamp: f64,
        _key_frame: bool,
    ) -> StorylineResult<()> {
        let session = self.session_mut()?;
        if let Some(last) = session.last_video_ts {
            if timestamp <= last {
                return Err(StorylineError::encode(format!(
                    "video sample at {timestamp:.4}s is not after {last:.4}s"
                )));
            }
        }
        let bytes = image.as_raw();
        if bytes.len() != session.frame_bytes {
            return Err(StorylineError::encode(format!(
                "frame size mismatch: got {}x{}",
                image.width(),
                image.height()
            )));
        }
        // Key frames are forced by the -force_key_frames expression at spawn time.
        session.video.write(bytes).await?;
        session.last_video_ts = Some(timestamp);
        Ok(())
    }

    async fn encode_audio(&mut self, _timestamp: f64, samples: &[f32]) -> StorylineResult<()> {
        let session = self.session_mut()?;
        let Some(audio) = session.audio.as_mut() else {
            return Err(StorylineError::encode("audio stream was not configured"));
        };
        let mut bytes = Vec::with_capacity(samples.len() * 4);
        for sample in samples {
            bytes.extend_from_slice(&sample.to_le_bytes());
        }
        audio.write(&bytes).await
    }

    async fn flush(&mut self) -> StorylineResult<()> {
        let session = self.session_mut()?;
        session.video.flush().await?;
        if let Some(audio) = session.audio.as_mut() {
            audio.flush().await?;
        }
        Ok(())
    }

    async fn finalize(&mut self) -> StorylineResult<MediaBlob> {
        let session = self
            .session
            .take()
            .ok_or_else(|| StorylineError::encode("ffmpeg encoder is not configured"))?;
        let video_path = session.video_path();
        let audio_path = session.audio_path();
        let Session {
            container,
            workdir,
            video,
            audio,
            ..
        } = session;

        video.close().await?;
        let has_audio = match audio {
            Some(audio) => {
                audio.close().await?;
                true
            }
            None => false,
        };

        if let Some(parent) = self.output.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    StorylineError::encode(format!(
                        "failed to create output directory {}: {e}",
                        parent.display()
                    ))
                })?;
            }
        }

        let args = mux_args(
            &video_path,
            has_audio.then_some(audio_path.as_path()),
            container,
            &self.output,
        );
        tracing::debug!(?args, "Muxing streams");
        let output = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| StorylineError::encode(format!("failed to start ffmpeg mux: {e}")))?;
        if !output.status.success() {
            return Err(StorylineError::encode(format!(
                "ffmpeg mux exited with status {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        drop(workdir);

        let size_bytes = tokio::fs::metadata(&self.output)
            .await
            .map(|m| m.len())
            .map_err(|e| StorylineError::encode(format!("muxed output is missing: {e}")))?;

        tracing::info!(output = %self.output.display(), size_bytes, "Export written");
        Ok(MediaBlob {
            path: self.output.clone(),
            mime_type: container.mime_type().to_string(),
            size_bytes,
        })
    }

    async fn abort(&mut self) {
        if let Some(session) = self.session.take() {
            tracing::warn!(output = %self.output.display(), "Aborting ffmpeg encoder");
            session.video.kill().await;
            if let Some(audio) = session.audio {
                audio.kill().await;
            }
        }
    }
}
