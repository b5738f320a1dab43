use anyhow::{bail, Result};

use crate::reference::ReferenceMode;

pub const DEFAULT_TARGET_PAYLOAD: &str = "MRI_HEAD_MOTION_TRACKER_V1.0";
pub const DEFAULT_CENTER_PAYLOAD: &str = "MRI_CENTER_LOC";
/// 1.5 inch printed marker
pub const DEFAULT_MARKER_WIDTH_MM: f64 = 38.1;
pub const DEFAULT_MOVEMENT_THRESHOLD_MM: f64 = 2.5;
pub const DEFAULT_STILL_TIME: f64 = 1.0;
pub const DEFAULT_HISTORY_WINDOW: f64 = 0.5;
pub const DEFAULT_HISTORY_RETENTION: f64 = 3.0;
pub const DEFAULT_HISTORY_CAPACITY: usize = 100;
pub const DEFAULT_REACQUIRE_PX: f64 = 10.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum MeasurementUnit {
    #[clap(name = "mm")]
    Millimeter,
    #[clap(name = "cm")]
    Centimeter,
}

impl MeasurementUnit {
    /// Convert an internal millimeter value for display.
    pub fn convert_mm(&self, mm: f64) -> f64 {
        match self {
            MeasurementUnit::Millimeter => mm,
            MeasurementUnit::Centimeter => mm / 10.,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MeasurementUnit::Millimeter => "mm",
            MeasurementUnit::Centimeter => "cm",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum ModeKind {
    /// reference set by the operator with `c`
    Manual,
    /// reference follows a second, dedicated center marker
    Dual,
}

#[derive(Clone, Debug, PartialEq)]
#[derive(clap::Parser)]
pub struct Config {
    /// Payload of the tracked marker
    #[clap(long, default_value = DEFAULT_TARGET_PAYLOAD)]
    pub target_payload: String,

    /// Payload of the reference marker (dual mode only)
    #[clap(long, default_value = DEFAULT_CENTER_PAYLOAD)]
    pub center_payload: String,

    #[clap(long, value_enum, default_value = "manual")]
    pub mode: ModeKind,

    /// Printed width of the marker in millimeters
    #[clap(long, default_value = "38.1")]
    pub marker_width_mm: f64,

    #[clap(long, value_enum, default_value = "mm")]
    pub unit: MeasurementUnit,

    /// Movement noise floor and centering tolerance, in millimeters
    #[clap(long, default_value = "2.5")]
    pub movement_threshold_mm: f64,

    /// Seconds without movement before the target counts as still
    #[clap(long, default_value = "1.0")]
    pub still_time: f64,

    /// Smoothing window of the movement detector, in seconds
    #[clap(long, default_value = "0.5")]
    pub history_window: f64,

    /// Maximum age of retained position samples, in seconds
    #[clap(long, default_value = "3.0")]
    pub history_retention: f64,

    #[clap(long, default_value = "100")]
    pub history_capacity: usize,

    /// Center marker jitter tolerated before the reference moves, in pixels
    #[clap(long, default_value = "10.0")]
    pub reacquire_px: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            target_payload: DEFAULT_TARGET_PAYLOAD.to_string(),
            center_payload: DEFAULT_CENTER_PAYLOAD.to_string(),
            mode: ModeKind::Manual,
            marker_width_mm: DEFAULT_MARKER_WIDTH_MM,
            unit: MeasurementUnit::Millimeter,
            movement_threshold_mm: DEFAULT_MOVEMENT_THRESHOLD_MM,
            still_time: DEFAULT_STILL_TIME,
            history_window: DEFAULT_HISTORY_WINDOW,
            history_retention: DEFAULT_HISTORY_RETENTION,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            reacquire_px: DEFAULT_REACQUIRE_PX,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("marker-width-mm", self.marker_width_mm),
            ("movement-threshold-mm", self.movement_threshold_mm),
            ("history-window", self.history_window),
            ("history-retention", self.history_retention),
            ("reacquire-px", self.reacquire_px),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.) {
                bail!("--{name} must be a positive number, got {value}");
            }
        }
        if !(self.still_time.is_finite() && self.still_time >= 0.) {
            bail!("--still-time must not be negative, got {}", self.still_time);
        }
        if self.history_capacity == 0 {
            bail!("--history-capacity must be at least 1");
        }
        if self.mode == ModeKind::Dual && self.center_payload == self.target_payload {
            bail!("center and target markers need distinct payloads");
        }
        Ok(())
    }

    pub fn reference_mode(&self) -> ReferenceMode {
        match self.mode {
            ModeKind::Manual => ReferenceMode::Manual,
            ModeKind::Dual => ReferenceMode::Automatic {
                center_payload: self.center_payload.clone(),
                reacquire_px: self.reacquire_px,
            },
        }
    }
}
