//! Streaming Quality Controller
//!
//! Owns the screen-streaming session: on/off state, quality preset, and the
//! metrics shown while streaming. While active two independent timers run:
//!
//! - every `data_usage_interval` the preset's data rate is added to the
//!   cumulative byte count
//! - every `metrics_interval` the frame rate is resampled within the preset's
//!   bounds and the latency within [`LATENCY_BOUNDS_MS`]
//!
//! ## Cancellation
//!
//! Each `start` opens a new generation. Ticks apply only while their
//! generation is current, and the check happens under the same lock as the
//! mutation. `stop` advances the generation under that lock, so once it
//! returns no tick scheduled earlier can change the session.
//!
//! Timers run on tokio time; tests pause the clock and advance it.

mod quality;
mod sampler;

pub use quality::{format_data_usage, QualityPreset, INITIAL_LATENCY_MS, LATENCY_BOUNDS_MS};
pub use sampler::{FastrandSampler, MetricSampler};

use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Default volume of the streamed audio
pub const DEFAULT_AUDIO_VOLUME: f64 = 0.8;

/// Shortest period a metric timer runs at
pub const MIN_TICK_PERIOD: Duration = Duration::from_millis(1);

/// Streaming configuration
#[derive(Debug, Clone)]
pub struct StreamingConfig {
    /// Period of the data usage tick
    pub data_usage_interval: Duration,
    /// Period of the frame rate and latency resampling
    pub metrics_interval: Duration,
    /// Pause between stop and start during `reset`
    pub reset_delay: Duration,
    /// Preset selected at construction
    pub default_quality: QualityPreset,
    /// Audio volume at construction
    pub default_volume: f64,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            data_usage_interval: Duration::from_secs(1),
            metrics_interval: Duration::from_secs(5),
            reset_delay: Duration::from_secs(1),
            default_quality: QualityPreset::Medium,
            default_volume: DEFAULT_AUDIO_VOLUME,
        }
    }
}

/// Recording and snapshot capture of the streamed screen
#[async_trait]
pub trait CaptureCollaborator: Send + Sync + Debug {
    async fn start_recording(&self) -> Result<()>;

    async fn stop_recording(&self) -> Result<()>;

    async fn take_snapshot(&self) -> Result<()>;
}

/// Observable streaming state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamingSession {
    /// Stream is running
    pub active: bool,
    /// Selected preset
    pub quality: QualityPreset,
    /// Resolution label of the preset
    pub resolution: String,
    /// Current frame rate
    pub frame_rate: u32,
    /// Bitrate label of the preset
    pub bitrate: String,
    /// Current latency
    pub latency_ms: u32,
    /// Bytes streamed since the last start
    pub cumulative_bytes: u64,
    /// Audio volume in `[0.0, 1.0]`
    pub audio_volume: f64,
    /// The capture collaborator is recording
    pub recording: bool,
}

impl StreamingSession {
    fn new(quality: QualityPreset, audio_volume: f64) -> Self {
        let mut session = Self {
            active: false,
            quality,
            resolution: String::new(),
            frame_rate: 0,
            bitrate: String::new(),
            latency_ms: INITIAL_LATENCY_MS,
            cumulative_bytes: 0,
            audio_volume: clamp_volume(audio_volume).unwrap_or(DEFAULT_AUDIO_VOLUME),
            recording: false,
        };
        session.apply_preset(quality);
        session
    }

    fn apply_preset(&mut self, quality: QualityPreset) {
        self.quality = quality;
        self.resolution = quality.resolution().to_string();
        self.frame_rate = quality.frame_rate();
        self.bitrate = quality.bitrate().to_string();
    }

    /// Data usage as display text
    pub fn data_usage(&self) -> String {
        format_data_usage(self.cumulative_bytes)
    }
}

/// Controller of the streaming session
///
/// Cloning the controller yields another handle onto the same session.
#[derive(Debug, Clone)]
pub struct StreamingController {
    state: Arc<watch::Sender<StreamingSession>>,
    generation: Arc<AtomicU64>,
    tasks: Arc<Mutex<Vec<JoinHandle<()>>>>,
    sampler: Arc<dyn MetricSampler>,
    capture: Arc<dyn CaptureCollaborator>,
    config: StreamingConfig,
}

impl StreamingController {
    /// Create an inactive controller at the configured defaults
    ///
    /// Timer periods shorter than [`MIN_TICK_PERIOD`] are raised to it.
    pub fn new(
        mut config: StreamingConfig,
        sampler: Arc<dyn MetricSampler>,
        capture: Arc<dyn CaptureCollaborator>,
    ) -> Self {
        config.data_usage_interval = config.data_usage_interval.max(MIN_TICK_PERIOD);
        config.metrics_interval = config.metrics_interval.max(MIN_TICK_PERIOD);
        let session = StreamingSession::new(config.default_quality, config.default_volume);
        let (state, _) = watch::channel(session);
        Self {
            state: Arc::new(state),
            generation: Arc::new(AtomicU64::new(0)),
            tasks: Arc::new(Mutex::new(Vec::new())),
            sampler,
            capture,
            config,
        }
    }

    /// Snapshot of the session
    pub fn snapshot(&self) -> StreamingSession {
        self.state.borrow().clone()
    }

    /// Observe session changes
    pub fn subscribe(&self) -> watch::Receiver<StreamingSession> {
        self.state.subscribe()
    }

    /// Whether the stream is running
    pub fn is_active(&self) -> bool {
        self.state.borrow().active
    }

    /// Select a preset
    ///
    /// Resolution, frame rate and bitrate take the preset's values
    /// immediately, whether or not the stream is running.
    pub fn set_quality(&self, quality: QualityPreset) {
        self.state.send_modify(|session| session.apply_preset(quality));
        debug!("Streaming quality set to {}", quality);
    }

    /// Start streaming
    ///
    /// Resets the data usage and starts the metric timers. Returns `false`
    /// if the stream was already running.
    pub fn start(&self) -> bool {
        let mut started = None;
        self.state.send_if_modified(|session| {
            if session.active {
                return false;
            }
            let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            session.active = true;
            session.cumulative_bytes = 0;
            started = Some(generation);
            true
        });

        let Some(generation) = started else {
            debug!("Streaming already active");
            return false;
        };

        let data_usage = self.spawn_ticker(
            self.config.data_usage_interval,
            generation,
            |session, _| {
                session.cumulative_bytes = session
                    .cumulative_bytes
                    .saturating_add(session.quality.bytes_per_second());
            },
        );
        let metrics = self.spawn_ticker(
            self.config.metrics_interval,
            generation,
            |session, sampler| {
                session.frame_rate = sampler.sample(session.quality.frame_rate_bounds());
                session.latency_ms = sampler.sample(LATENCY_BOUNDS_MS);
            },
        );

        match self.tasks.lock() {
            Ok(mut tasks) => {
                tasks.push(data_usage);
                tasks.push(metrics);
            }
            Err(_) => {
                // Generation guard still stops the ticks
                warn!("Streaming task list poisoned");
            }
        }

        info!("Streaming started (generation {})", generation);
        true
    }

    /// Stop streaming
    ///
    /// All display fields keep their last values. No tick mutates the
    /// session after this returns. Also cancels a pending [`reset`](Self::reset)
    /// restart. Returns `false` if the stream was not running.
    pub fn stop(&self) -> bool {
        let stopped = self.state.send_if_modified(|session| {
            self.generation.fetch_add(1, Ordering::SeqCst);
            if !session.active {
                return false;
            }
            session.active = false;
            true
        });

        if let Ok(mut tasks) = self.tasks.lock() {
            for task in tasks.drain(..) {
                task.abort();
            }
        }

        if stopped {
            info!("Streaming stopped");
        }
        stopped
    }

    /// Stop, wait the reset delay, then start again
    ///
    /// Does nothing if the stream is not running. The restart is skipped if
    /// the stream was started or stopped by someone else during the delay.
    /// Returns whether the stream was restarted.
    pub async fn reset(&self) -> bool {
        if !self.stop() {
            return false;
        }

        let generation = self.generation.load(Ordering::SeqCst);
        tokio::time::sleep(self.config.reset_delay).await;

        if self.generation.load(Ordering::SeqCst) != generation {
            debug!("Streaming reset superseded");
            return false;
        }
        self.start()
    }

    /// Set the audio volume, clamped to `[0.0, 1.0]`
    ///
    /// NaN leaves the volume unchanged. Returns the volume in effect.
    pub fn set_audio_volume(&self, volume: f64) -> f64 {
        let mut effective = volume;
        self.state.send_if_modified(|session| match clamp_volume(volume) {
            Some(volume) if volume != session.audio_volume => {
                session.audio_volume = volume;
                effective = volume;
                true
            }
            _ => {
                effective = session.audio_volume;
                false
            }
        });
        effective
    }

    /// Start recording through the capture collaborator
    pub async fn start_recording(&self) -> Result<()> {
        self.capture.start_recording().await?;
        self.state.send_if_modified(|session| !std::mem::replace(&mut session.recording, true));
        info!("Recording started");
        Ok(())
    }

    /// Stop recording through the capture collaborator
    pub async fn stop_recording(&self) -> Result<()> {
        self.capture.stop_recording().await?;
        self.state.send_if_modified(|session| std::mem::replace(&mut session.recording, false));
        info!("Recording stopped");
        Ok(())
    }

    /// Capture a snapshot through the capture collaborator
    pub async fn take_snapshot(&self) -> Result<()> {
        self.capture.take_snapshot().await?;
        debug!("Snapshot taken");
        Ok(())
    }

    fn spawn_ticker<F>(&self, period: Duration, generation: u64, tick: F) -> JoinHandle<()>
    where
        F: Fn(&mut StreamingSession, &dyn MetricSampler) + Send + 'static,
    {
        let state = self.state.clone();
        let current = self.generation.clone();
        let sampler = self.sampler.clone();
        let first = Instant::now() + period;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(first, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                interval.tick().await;
                let applied = state.send_if_modified(|session| {
                    if current.load(Ordering::SeqCst) != generation || !session.active {
                        return false;
                    }
                    tick(session, sampler.as_ref());
                    true
                });
                if !applied {
                    debug!("Streaming tick of generation {} retired", generation);
                    break;
                }
            }
        })
    }
}

fn clamp_volume(volume: f64) -> Option<f64> {
    if volume.is_nan() {
        None
    } else {
        Some(volume.clamp(0.0, 1.0))
    }
}
