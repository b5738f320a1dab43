//! Still/moving and centered/off-center classification of the target.

use std::fmt;

use crate::my_types::*;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Motion {
    Still,
    Moving,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Alignment {
    Centered,
    NotCentered,
}

/// Display emphasis. Motion dominates: a moving target is always an alert.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Ok,
    Warning,
    Alert,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Status {
    pub motion: Motion,
    pub alignment: Alignment,
}

impl Status {
    pub fn severity(&self) -> Severity {
        match (self.motion, self.alignment) {
            (Motion::Still, Alignment::Centered) => Severity::Ok,
            (Motion::Still, Alignment::NotCentered) => Severity::Warning,
            (Motion::Moving, _) => Severity::Alert,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let motion = match self.motion {
            Motion::Still => "STILL",
            Motion::Moving => "MOVING",
        };
        let alignment = match self.alignment {
            Alignment::Centered => "Centered",
            Alignment::NotCentered => "Not Centered",
        };
        write!(f, "{motion}; {alignment}")
    }
}

#[derive(Clone, Copy, Debug)]
pub struct StabilityClassifier {
    /// seconds without movement before STILL
    still_time: f64,
    /// centering tolerance in millimeters
    tolerance_mm: f64,
}

impl StabilityClassifier {
    pub fn new(still_time: f64, tolerance_mm: f64) -> Self {
        Self { still_time, tolerance_mm }
    }

    pub fn motion(&self, now: Timestamp, last_movement: Option<Timestamp>) -> Motion {
        match last_movement {
            Some(t) if now - t >= self.still_time => Motion::Still,
            _ => Motion::Moving,
        }
    }

    pub fn alignment(&self, total_mm: f64) -> Alignment {
        if total_mm <= self.tolerance_mm {
            Alignment::Centered
        } else {
            Alignment::NotCentered
        }
    }

    pub fn classify(&self, now: Timestamp, last_movement: Option<Timestamp>, total_mm: f64) -> Status {
        Status {
            motion: self.motion(now, last_movement),
            alignment: self.alignment(total_mm),
        }
    }
}
