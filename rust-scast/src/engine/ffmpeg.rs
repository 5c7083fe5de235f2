//! FFmpeg encoding engine implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::{Child, ChildStderr, Command};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::traits::{EncodingEngine, EngineEvent, EngineHandle, EngineReporter, engine_channel};
use super::utils::{RecordReader, is_error_line, parse_progress, write_concat_playlist};
use crate::input::{AudioChainFeeder, AudioMixPlan, FeederExit, InputPlan, PlaylistPlan};
use crate::{Error, Result};

/// FFmpeg engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FfmpegEngineConfig {
    /// Path to the ffmpeg binary.
    pub binary_path: String,
    /// Directory for playlist descriptors.
    pub work_dir: PathBuf,
    /// Output canvas width for audio sessions.
    pub width: u32,
    /// Output canvas height for audio sessions.
    pub height: u32,
    pub frame_rate: u32,
    /// Keyframe interval in frames.
    pub gop_size: u32,
    pub video_bitrate_kbps: u32,
    pub audio_bitrate_kbps: u32,
    pub audio_sample_rate: u32,
    /// Container format of the bytes the audio chain feeds in.
    pub audio_input_format: String,
    /// Container format pushed to the destination.
    pub output_format: String,
    /// Extra arguments placed before the inputs.
    pub input_args: Vec<String>,
    /// Extra arguments placed before the destination.
    pub output_args: Vec<String>,
}

impl Default for FfmpegEngineConfig {
    fn default() -> Self {
        Self {
            binary_path: "ffmpeg".to_string(),
            work_dir: PathBuf::from("data"),
            width: 1280,
            height: 720,
            frame_rate: 24,
            gop_size: 48,
            video_bitrate_kbps: 3000,
            audio_bitrate_kbps: 128,
            audio_sample_rate: 44100,
            audio_input_format: "mp3".to_string(),
            output_format: "flv".to_string(),
            input_args: Vec::new(),
            output_args: Vec::new(),
        }
    }
}

/// FFmpeg-based encoding engine.
pub struct FfmpegEngine {
    /// Engine configuration.
    config: FfmpegEngineConfig,
    /// Cached version string.
    version: Option<String>,
}

impl FfmpegEngine {
    /// Create a new FFmpeg engine with default configuration.
    pub fn new() -> Self {
        Self::with_config(FfmpegEngineConfig::default())
    }

    /// Create with a custom configuration.
    pub fn with_config(config: FfmpegEngineConfig) -> Self {
        let version = Self::detect_version(&config.binary_path);
        Self { config, version }
    }

    pub fn config(&self) -> &FfmpegEngineConfig {
        &self.config
    }

    /// Detect ffmpeg version.
    fn detect_version(path: &str) -> Option<String> {
        std::process::Command::new(path)
            .arg("-version")
            .output()
            .ok()
            .and_then(|output| {
                String::from_utf8(output.stdout)
                    .ok()
                    .and_then(|s| s.lines().next().map(|l| l.to_string()))
            })
    }

    /// Arguments for a video playlist read through the concat demuxer and
    /// pushed without re-encoding.
    fn playlist_args(&self, plan: &PlaylistPlan, playlist_path: &Path, destination: &str) -> Vec<String> {
        let mut args: Vec<String> = vec!["-hide_banner".into(), "-nostdin".into()];
        args.extend(self.config.input_args.iter().cloned());

        if plan.looping {
            args.extend(["-stream_loop".into(), "-1".into()]);
        }
        args.extend([
            "-f".into(),
            "concat".into(),
            "-safe".into(),
            "0".into(),
            "-re".into(),
            "-i".into(),
            playlist_path.to_string_lossy().to_string(),
        ]);

        args.extend(["-c".into(), "copy".into()]);
        self.push_output(&mut args, destination);
        args
    }

    /// Arguments for an audio chain on stdin with a still image as video.
    fn audio_mix_args(&self, plan: &AudioMixPlan, destination: &str) -> Vec<String> {
        let c = &self.config;
        let mut args: Vec<String> = vec!["-hide_banner".into()];
        args.extend(c.input_args.iter().cloned());

        // Input 0: the picture.
        match &plan.overlay_image {
            Some(image) => args.extend([
                "-loop".into(),
                "1".into(),
                "-framerate".into(),
                "2".into(),
                "-re".into(),
                "-i".into(),
                image.to_string_lossy().to_string(),
            ]),
            None => args.extend([
                "-f".into(),
                "lavfi".into(),
                "-re".into(),
                "-i".into(),
                format!("color=c=black:s={}x{}:r={}", c.width, c.height, c.frame_rate),
            ]),
        }

        // Input 1: the audio chain.
        args.extend([
            "-f".into(),
            c.audio_input_format.clone(),
            "-re".into(),
            "-i".into(),
            "pipe:0".into(),
        ]);

        let video_filter = format!(
            "scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2:color=black,format=yuv420p",
            w = c.width,
            h = c.height
        );
        let video_bitrate = format!("{}k", c.video_bitrate_kbps);

        args.extend([
            "-map".into(),
            "0:v".into(),
            "-map".into(),
            "1:a".into(),
            "-vf".into(),
            video_filter,
            "-c:v".into(),
            "libx264".into(),
            "-preset".into(),
            "ultrafast".into(),
            "-r".into(),
            c.frame_rate.to_string(),
            "-g".into(),
            c.gop_size.to_string(),
            "-keyint_min".into(),
            c.gop_size.to_string(),
            "-sc_threshold".into(),
            "0".into(),
            "-b:v".into(),
            video_bitrate.clone(),
            "-minrate".into(),
            video_bitrate.clone(),
            "-maxrate".into(),
            video_bitrate,
            "-bufsize".into(),
            format!("{}k", c.video_bitrate_kbps * 2),
            "-nal-hrd".into(),
            "cbr".into(),
            "-c:a".into(),
            "aac".into(),
            "-b:a".into(),
            format!("{}k", c.audio_bitrate_kbps),
            "-ar".into(),
            c.audio_sample_rate.to_string(),
            "-af".into(),
            "aresample=async=1".into(),
            // The picture never ends; the audio chain decides when we stop.
            "-shortest".into(),
        ]);

        self.push_output(&mut args, destination);
        args
    }

    fn push_output(&self, args: &mut Vec<String>, destination: &str) {
        args.extend([
            "-f".into(),
            self.config.output_format.clone(),
            "-flvflags".into(),
            "no_duration_filesize".into(),
        ]);
        args.extend(self.config.output_args.iter().cloned());
        args.push(destination.to_string());
    }

    /// Watch a running ffmpeg process until it exits or is terminated,
    /// forwarding progress and finally the terminal event.
    async fn supervise(
        job_id: String,
        mut child: Child,
        stderr: ChildStderr,
        feeder: Option<(JoinHandle<FeederExit>, CancellationToken)>,
        playlist_path: Option<PathBuf>,
        reporter: EngineReporter,
    ) {
        let cancellation_token = reporter.cancellation_token();
        let mut records = RecordReader::new(stderr);
        let mut last_error: Option<String> = None;

        let terminated = loop {
            tokio::select! {
                biased;
                _ = cancellation_token.cancelled() => break true,
                record = records.next_record() => match record {
                    Ok(Some(line)) => {
                        if let Some(progress) = parse_progress(&line) {
                            reporter.report_progress(progress);
                        } else if is_error_line(&line) {
                            warn!("FFmpeg error for {}: {}", job_id, line);
                            last_error = Some(line);
                        }
                    }
                    Ok(None) => break false,
                    Err(e) => {
                        warn!("Error reading ffmpeg output for {}: {}", job_id, e);
                        break false;
                    }
                }
            }
        };

        let outcome = if terminated {
            Self::kill(&job_id, &mut child).await;
            EngineEvent::Terminated
        } else {
            tokio::select! {
                biased;
                _ = cancellation_token.cancelled() => {
                    Self::kill(&job_id, &mut child).await;
                    EngineEvent::Terminated
                }
                status = child.wait() => match status {
                    Ok(status) if status.success() => EngineEvent::Ended,
                    Ok(status) => EngineEvent::Failed {
                        cause: last_error
                            .unwrap_or_else(|| format!("ffmpeg exited with {}", status)),
                    },
                    Err(e) => EngineEvent::Failed {
                        cause: format!("Failed to wait for ffmpeg: {}", e),
                    },
                }
            }
        };

        if let Some((feeder, feeder_token)) = feeder {
            feeder_token.cancel();
            match feeder.await {
                Ok(exit) => debug!("Audio chain for {} stopped: {:?}", job_id, exit),
                Err(e) => warn!("Audio chain task for {} failed: {}", job_id, e),
            }
        }

        if let Some(path) = playlist_path
            && let Err(e) = tokio::fs::remove_file(&path).await
        {
            debug!("Failed to remove playlist {}: {}", path.display(), e);
        }

        match &outcome {
            EngineEvent::Ended => info!("FFmpeg job {} finished", job_id),
            EngineEvent::Failed { cause } => error!("FFmpeg job {} failed: {}", job_id, cause),
            _ => info!("FFmpeg job {} terminated", job_id),
        }

        reporter.finish(outcome).await;
    }

    async fn kill(job_id: &str, child: &mut Child) {
        if let Err(e) = child.kill().await {
            warn!("Failed to kill ffmpeg for {}: {}", job_id, e);
        }
    }
}

impl Default for FfmpegEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EncodingEngine for FfmpegEngine {
    fn name(&self) -> &'static str {
        "ffmpeg"
    }

    async fn launch(&self, plan: &InputPlan, destination: &str) -> Result<EngineHandle> {
        let job_id = uuid::Uuid::new_v4().to_string();

        let (args, playlist_path) = match plan {
            InputPlan::Playlist(playlist) => {
                let path =
                    write_concat_playlist(&self.config.work_dir, &job_id, &playlist.files).await?;
                (self.playlist_args(playlist, &path, destination), Some(path))
            }
            InputPlan::AudioMix(mix) => (self.audio_mix_args(mix, destination), None),
        };
        let feeds_stdin = matches!(plan, InputPlan::AudioMix(_));

        info!(
            "Launching ffmpeg job {} ({}) with args: {:?}",
            job_id,
            plan.kind(),
            args
        );

        let spawned = Command::new(&self.config.binary_path)
            .args(&args)
            .env("LC_ALL", "C")
            .stdin(if feeds_stdin { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => {
                if let Some(path) = &playlist_path {
                    let _ = tokio::fs::remove_file(path).await;
                }
                return Err(Error::engine(format!("Failed to spawn ffmpeg: {}", e)));
            }
        };

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::engine("Failed to capture ffmpeg stderr"))?;

        let (handle, reporter) = engine_channel(job_id.clone());

        let feeder = match plan {
            InputPlan::AudioMix(mix) => {
                let stdin = child
                    .stdin
                    .take()
                    .ok_or_else(|| Error::engine("Failed to capture ffmpeg stdin"))?;
                let token = reporter.cancellation_token().child_token();
                let task = AudioChainFeeder::new(mix.audio_files.clone(), mix.looping)
                    .spawn(stdin, token.clone());
                Some((task, token))
            }
            InputPlan::Playlist(_) => None,
        };

        tokio::spawn(Self::supervise(
            job_id,
            child,
            stderr,
            feeder,
            playlist_path,
            reporter,
        ));

        Ok(handle)
    }

    fn is_available(&self) -> bool {
        self.version.is_some()
    }

    fn version(&self) -> Option<String> {
        self.version.clone()
    }
}
