//! Where the zero-displacement origin comes from.
//!
//! In manual mode the operator pins the reference to the target's current
//! position. In automatic mode a second marker is watched every frame and the
//! reference follows it, but only once it has drifted past a pixel tolerance:
//! re-acquiring wipes the motion history, so per-frame detector jitter on the
//! center marker must not trigger it.

use std::fmt;

use crate::marker::{find_marker, DetectedMarker};
use crate::my_types::*;

#[derive(Clone, Debug, PartialEq)]
pub enum ReferenceMode {
    Manual,
    Automatic {
        center_payload: String,
        /// raw pixel distance, independent of calibration
        reacquire_px: f64,
    },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ReferenceUpdate {
    Unchanged,
    Acquired(Vector2d),
    Reacquired { previous: Vector2d, current: Vector2d },
}

impl ReferenceUpdate {
    pub fn new_reference(&self) -> Option<Vector2d> {
        match *self {
            ReferenceUpdate::Unchanged => None,
            ReferenceUpdate::Acquired(p) => Some(p),
            ReferenceUpdate::Reacquired { current, .. } => Some(current),
        }
    }
}

/// Reason a SetCenter command was refused. Not fatal, surfaced to the operator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CenterRejected {
    TargetNotVisible,
    AutomaticMode,
}

impl fmt::Display for CenterRejected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CenterRejected::TargetNotVisible => write!(f, "cannot set center, target marker not visible"),
            CenterRejected::AutomaticMode => {
                write!(f, "cannot set center, reference follows the center marker")
            }
        }
    }
}

impl std::error::Error for CenterRejected {}

#[derive(Clone, Debug)]
pub struct ReferenceAcquisition {
    mode: ReferenceMode,
}

impl ReferenceAcquisition {
    pub fn new(mode: ReferenceMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> &ReferenceMode {
        &self.mode
    }

    pub fn is_automatic(&self) -> bool {
        matches!(self.mode, ReferenceMode::Automatic { .. })
    }

    /// The center marker among this frame's detections, if the mode uses one.
    pub fn center_marker<'a>(&self, markers: &'a [DetectedMarker]) -> Option<&'a DetectedMarker> {
        match &self.mode {
            ReferenceMode::Automatic { center_payload, .. } => find_marker(markers, center_payload),
            ReferenceMode::Manual => None,
        }
    }

    /// Automatic mode: decide whether this frame moves the reference.
    pub fn observe(&self, stored: Option<Vector2d>, markers: &[DetectedMarker]) -> ReferenceUpdate {
        let reacquire_px = match self.mode {
            ReferenceMode::Automatic { reacquire_px, .. } => reacquire_px,
            ReferenceMode::Manual => return ReferenceUpdate::Unchanged,
        };
        match self.center_marker(markers) {
            Some(center) => reacquire(stored, center.center, reacquire_px),
            None => ReferenceUpdate::Unchanged,
        }
    }

    /// Manual mode: pin the reference to the target center seen this frame.
    pub fn set_center(&self, target: Option<Vector2d>) -> Result<Vector2d, CenterRejected> {
        if self.is_automatic() {
            return Err(CenterRejected::AutomaticMode);
        }
        target.ok_or(CenterRejected::TargetNotVisible)
    }
}

/// Hysteresis rule for a reference that follows an observed point.
pub fn reacquire(stored: Option<Vector2d>, observed: Vector2d, threshold_px: f64) -> ReferenceUpdate {
    match stored {
        None => ReferenceUpdate::Acquired(observed),
        Some(previous) if (observed - previous).norm() > threshold_px => ReferenceUpdate::Reacquired {
            previous,
            current: observed,
        },
        Some(_) => ReferenceUpdate::Unchanged,
    }
}
