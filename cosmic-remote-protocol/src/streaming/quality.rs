//! Streaming quality presets

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;

/// Latency bound sampled while streaming, in milliseconds
pub const LATENCY_BOUNDS_MS: RangeInclusive<u32> = 30..=100;

/// Latency shown before the first metrics tick
pub const INITIAL_LATENCY_MS: u32 = 50;

/// Named bundle of stream settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityPreset {
    Low,
    #[default]
    Medium,
    High,
    Ultra,
}

impl QualityPreset {
    /// Every preset, lowest first
    pub const ALL: [QualityPreset; 4] = [
        QualityPreset::Low,
        QualityPreset::Medium,
        QualityPreset::High,
        QualityPreset::Ultra,
    ];

    /// Resolution label
    pub fn resolution(self) -> &'static str {
        match self {
            QualityPreset::Low => "480p",
            QualityPreset::Medium => "720p",
            QualityPreset::High => "1080p",
            QualityPreset::Ultra => "original",
        }
    }

    /// Nominal frame rate
    pub fn frame_rate(self) -> u32 {
        match self {
            QualityPreset::Low => 24,
            QualityPreset::Medium | QualityPreset::High | QualityPreset::Ultra => 30,
        }
    }

    /// Bitrate label
    pub fn bitrate(self) -> &'static str {
        match self {
            QualityPreset::Low => "1 Mbps",
            QualityPreset::Medium => "2.5 Mbps",
            QualityPreset::High => "5 Mbps",
            QualityPreset::Ultra => "10+ Mbps",
        }
    }

    /// Bytes added to the data usage per second of streaming
    pub fn bytes_per_second(self) -> u64 {
        match self {
            QualityPreset::Low => 250 * 1024,
            QualityPreset::Medium => 500 * 1024,
            QualityPreset::High => 1024 * 1024,
            QualityPreset::Ultra => 2 * 1024 * 1024,
        }
    }

    /// Range the frame rate drifts in while streaming
    pub fn frame_rate_bounds(self) -> RangeInclusive<u32> {
        match self {
            QualityPreset::Low => 20..=25,
            QualityPreset::Medium => 25..=30,
            QualityPreset::High => 28..=30,
            QualityPreset::Ultra => 30..=30,
        }
    }
}

impl fmt::Display for QualityPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QualityPreset::Low => write!(f, "low"),
            QualityPreset::Medium => write!(f, "medium"),
            QualityPreset::High => write!(f, "high"),
            QualityPreset::Ultra => write!(f, "ultra"),
        }
    }
}

impl std::str::FromStr for QualityPreset {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(QualityPreset::Low),
            "medium" => Ok(QualityPreset::Medium),
            "high" => Ok(QualityPreset::High),
            "ultra" => Ok(QualityPreset::Ultra),
            other => Err(format!("unknown quality preset: {}", other)),
        }
    }
}

/// Render cumulative data usage in MB or GB
pub fn format_data_usage(bytes: u64) -> String {
    const MB: f64 = 1_000_000.0;
    const GB: f64 = 1_000_000_000.0;

    if bytes == 0 {
        return "0 MB".to_string();
    }
    let value = bytes as f64;
    if value < GB {
        format!("{:.1} MB", value / MB)
    } else {
        format!("{:.2} GB", value / GB)
    }
}
