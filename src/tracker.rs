use tracing::{debug, info, warn};

use crate::calibration::CalibrationScale;
use crate::config::{Config, MeasurementUnit};
use crate::displacement::{displacement, Displacement};
use crate::marker::{find_marker, DetectedMarker};
use crate::my_types::*;
use crate::reference::{CenterRejected, ReferenceAcquisition, ReferenceUpdate};
use crate::stationary::{Movement, PositionHistory};
use crate::status::{StabilityClassifier, Status};

/// Operator commands, polled once per frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    SetCenter,
    ResetCenter,
    Quit,
}

/// Everything the engine remembers between frames.
#[derive(Debug)]
pub struct TrackingContext {
    pub reference: Option<Vector2d>,
    pub calibration: CalibrationScale,
    pub history: PositionHistory,
    pub last_movement: Option<Timestamp>,
    pub unit: MeasurementUnit,
}

impl TrackingContext {
    pub fn new(config: &Config) -> Self {
        Self {
            reference: None,
            calibration: CalibrationScale::new(),
            history: PositionHistory::new(
                config.history_capacity,
                config.history_window,
                config.history_retention,
                config.movement_threshold_mm,
            ),
            last_movement: None,
            unit: config.unit,
        }
    }

    /// Move the origin. History restarts and the target counts as moving.
    fn set_reference(&mut self, pixel: Vector2d, now: Timestamp) {
        self.reference = Some(pixel);
        self.history.clear();
        self.last_movement = Some(now);
    }

    fn clear_reference(&mut self) {
        self.reference = None;
        self.history.clear();
        self.last_movement = None;
    }

    /// Back to the start-up state, calibration included.
    pub fn reset(&mut self) {
        self.clear_reference();
        self.calibration.clear();
    }

    /// Seconds since the last detected movement, 0 when unknown.
    pub fn still_for(&self, now: Timestamp) -> f64 {
        self.last_movement.map(|t| now - t).unwrap_or(0.)
    }
}

/// Per-frame output handed to the presenter.
#[derive(Clone, Debug)]
pub struct FrameReport {
    pub time: Timestamp,
    pub target: Option<DetectedMarker>,
    /// reference marker, automatic mode only
    pub center_marker: Option<DetectedMarker>,
    pub reference: Option<Vector2d>,
    pub reference_update: ReferenceUpdate,
    pub movement: Option<Movement>,
    /// millimeters; present whenever the target is visible
    pub displacement: Option<Displacement>,
    /// present when the target is visible and a reference is set
    pub status: Option<Status>,
    pub still_for: f64,
    pub unit: MeasurementUnit,
    pub automatic: bool,
}

impl FrameReport {
    pub fn display_displacement(&self) -> Option<Displacement> {
        self.displacement.map(|d| d.in_unit(self.unit))
    }
}

pub struct Tracker {
    context: TrackingContext,
    acquisition: ReferenceAcquisition,
    classifier: StabilityClassifier,
    target_payload: String,
    marker_width_mm: f64,
    /// time of the last processed frame
    last_time: Option<Timestamp>,
    /// target center in the last processed frame
    last_target: Option<Vector2d>,
}

impl Tracker {
    pub fn new(config: &Config) -> Self {
        Self {
            context: TrackingContext::new(config),
            acquisition: ReferenceAcquisition::new(config.reference_mode()),
            classifier: StabilityClassifier::new(config.still_time, config.movement_threshold_mm),
            target_payload: config.target_payload.clone(),
            marker_width_mm: config.marker_width_mm,
            last_time: None,
            last_target: None,
        }
    }

    pub fn context(&self) -> &TrackingContext {
        &self.context
    }

    pub fn acquisition(&self) -> &ReferenceAcquisition {
        &self.acquisition
    }

    /// Run the pipeline on one frame's detections. Returns `None` when the
    /// frame is older than the previous one and was discarded.
    pub fn process(&mut self, time: Timestamp, markers: &[DetectedMarker]) -> Option<FrameReport> {
        if let Some(last_time) = self.last_time {
            if time < last_time {
                warn!("discard unordered frame at {time:.3}s (last {last_time:.3}s)");
                return None;
            }
        }
        self.last_time = Some(time);

        let target = find_marker(markers, &self.target_payload).cloned();
        if let Some(target) = &target {
            self.context.calibration.update(target.pixel_width, self.marker_width_mm);
        }

        let reference_update = self.acquisition.observe(self.context.reference, markers);
        match reference_update {
            ReferenceUpdate::Unchanged => {}
            ReferenceUpdate::Acquired(p) => {
                info!("center automatically set at pixel ({:.1}, {:.1})", p.x, p.y);
                self.context.set_reference(p, time);
            }
            ReferenceUpdate::Reacquired { previous, current } => {
                info!(
                    "center marker moved {:.1}px, reference reset to ({:.1}, {:.1})",
                    (current - previous).norm(),
                    current.x,
                    current.y
                );
                self.context.set_reference(current, time);
            }
        }

        let mut movement = None;
        let mut measured = None;
        let mut status = None;
        if let Some(target) = &target {
            let m = self.context.history.observe(target.center, time, &self.context.calibration);
            if m.is_movement() {
                self.context.last_movement = Some(time);
            }
            movement = Some(m);

            let d = displacement(target.center, self.context.reference, &self.context.calibration);
            if self.context.reference.is_some() {
                status = Some(self.classifier.classify(time, self.context.last_movement, d.total));
            }
            measured = Some(d);
        }
        self.last_target = target.as_ref().map(|t| t.center);

        let report = FrameReport {
            time,
            center_marker: self.acquisition.center_marker(markers).cloned(),
            target,
            reference: self.context.reference,
            reference_update,
            movement,
            displacement: measured,
            status,
            still_for: self.context.still_for(time),
            unit: self.context.unit,
            automatic: self.acquisition.is_automatic(),
        };
        if let (Some(status), Some(d)) = (report.status, report.displacement) {
            debug!("{time:.3}s {status} total {:.2}mm still {:.1}s", d.total, report.still_for);
        }
        Some(report)
    }

    /// Pin the reference to where the target was seen in the last frame.
    pub fn set_center(&mut self) -> Result<Vector2d, CenterRejected> {
        let center = self.acquisition.set_center(self.last_target)?;
        let now = self.last_time.unwrap_or(0.);
        self.context.set_reference(center, now);
        info!("center set at pixel ({:.1}, {:.1})", center.x, center.y);
        Ok(center)
    }

    pub fn reset_center(&mut self) {
        self.context.clear_reference();
        if self.acquisition.is_automatic() {
            info!("center reset, show the center marker to set a new reference");
        } else {
            info!("center reset");
        }
    }

    /// Apply an operator command. Returns `false` when the loop should stop.
    pub fn handle(&mut self, command: Command) -> bool {
        match command {
            Command::SetCenter => {
                if let Err(e) = self.set_center() {
                    warn!("{e}");
                }
            }
            Command::ResetCenter => self.reset_center(),
            Command::Quit => return false,
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModeKind;
    use crate::status::{Alignment, Motion};
    use rand::{Rng, SeedableRng};
    use rand_xoshiro::Xoshiro256PlusPlus;

    const TARGET: &str = crate::config::DEFAULT_TARGET_PAYLOAD;
    const CENTER: &str = crate::config::DEFAULT_CENTER_PAYLOAD;
    const FPS: f64 = 30.;

    fn target_at(x: f64, y: f64) -> DetectedMarker {
        // 200 px wide, 38.1 mm printed
        DetectedMarker::square(TARGET, Vector2d::new(x, y), 200.)
    }

    fn center_at(x: f64, y: f64) -> DetectedMarker {
        DetectedMarker::square(CENTER, Vector2d::new(x, y), 120.)
    }

    fn dual_config() -> Config {
        Config {
            mode: ModeKind::Dual,
            ..Config::default()
        }
    }

    #[test]
    fn test_scenario_calibrated_offset_is_not_centered() {
        let mut tracker = Tracker::new(&Config::default());
        tracker.process(0., &[target_at(100., 100.)]);
        let ppmm = tracker.context().calibration.pixels_per_mm().unwrap();
        assert!((ppmm - 5.249).abs() < 1e-3);

        assert_eq!(tracker.set_center(), Ok(Vector2d::new(100., 100.)));
        let report = tracker.process(0.1, &[target_at(126., 100.)]).unwrap();
        let d = report.displacement.unwrap();
        assert!((d.total - 4.95).abs() < 0.01);
        assert_eq!(report.status.unwrap().alignment, Alignment::NotCentered);
    }

    #[test]
    fn test_scenario_no_reference() {
        let mut tracker = Tracker::new(&Config::default());
        for i in 0..10 {
            let report = tracker.process(i as f64 / FPS, &[target_at(300. + i as f64, 200.)]).unwrap();
            assert_eq!(report.displacement, Some(Displacement::zero()));
            assert!(report.status.is_none());
        }
    }

    #[test]
    fn test_scenario_still_after_stationary_period() {
        let run = |duration: f64| {
            let mut tracker = Tracker::new(&Config::default());
            tracker.process(0., &[target_at(320., 240.)]);
            tracker.set_center().unwrap();
            let mut rng = Xoshiro256PlusPlus::seed_from_u64(1);
            let frames = (duration * FPS).round() as usize;
            let mut last = None;
            for i in 1..=frames {
                let jitter = rng.gen_range(-1.0..1.0);
                last = tracker.process(i as f64 / FPS, &[target_at(320. + jitter, 240. - jitter)]);
            }
            last.unwrap().status.unwrap()
        };

        let status = run(1.2);
        assert_eq!(status.motion, Motion::Still);
        assert_eq!(status.alignment, Alignment::Centered);
        assert_eq!(run(0.3).motion, Motion::Moving);
    }

    #[test]
    fn test_movement_restarts_still_timer() {
        let mut tracker = Tracker::new(&Config::default());
        tracker.process(0., &[target_at(320., 240.)]);
        tracker.set_center().unwrap();
        for i in 1..=45 {
            tracker.process(i as f64 / FPS, &[target_at(320., 240.)]);
        }
        let report = tracker.process(46. / FPS, &[target_at(320., 240.)]).unwrap();
        assert_eq!(report.status.unwrap().motion, Motion::Still);

        // 40 px is ~7.6 mm
        let report = tracker.process(47. / FPS, &[target_at(360., 240.)]).unwrap();
        assert!(matches!(report.movement, Some(Movement::Moved { .. })));
        assert_eq!(report.status.unwrap().motion, Motion::Moving);
        assert_eq!(report.still_for, 0.);
        assert_eq!(tracker.context().last_movement, Some(47. / FPS));
    }

    #[test]
    fn test_still_after_target_gap() {
        let mut tracker = Tracker::new(&Config::default());
        tracker.process(0., &[target_at(320., 240.)]);
        tracker.set_center().unwrap();
        for i in 1..=15 {
            tracker.process(i as f64 / FPS, &[target_at(320., 240.)]);
        }
        // target hidden for 1.5 s
        for i in 16..60 {
            let report = tracker.process(i as f64 / FPS, &[]).unwrap();
            assert!(report.status.is_none());
        }

        // reappears 20 px (~3.8 mm) away, nothing recent to compare against
        let report = tracker.process(2.0, &[target_at(340., 240.)]).unwrap();
        assert_eq!(report.movement, Some(Movement::Unknown));
        let status = report.status.unwrap();
        assert_eq!(status.motion, Motion::Still);
        assert_eq!(status.alignment, Alignment::NotCentered);
        // first sample after set_center was the last movement
        assert_eq!(tracker.context().last_movement, Some(1. / FPS));
        assert!((report.still_for - (2.0 - 1. / FPS)).abs() < 1e-9);
    }

    #[test]
    fn test_first_sample_is_moving() {
        let mut tracker = Tracker::new(&Config::default());
        let report = tracker.process(2., &[target_at(0., 0.)]).unwrap();
        assert_eq!(report.movement, Some(Movement::First));
        assert_eq!(tracker.context().last_movement, Some(2.));
    }

    #[test]
    fn test_missing_target_changes_nothing() {
        let mut tracker = Tracker::new(&Config::default());
        tracker.process(0., &[target_at(50., 50.)]);
        tracker.set_center().unwrap();
        tracker.process(0.1, &[target_at(50., 50.)]);
        let history_len = tracker.context().history.len();
        let calibration = tracker.context().calibration;

        let report = tracker.process(0.2, &[]).unwrap();
        assert!(report.target.is_none());
        assert!(report.displacement.is_none());
        assert!(report.status.is_none());
        assert_eq!(tracker.context().history.len(), history_len);
        assert_eq!(tracker.context().calibration, calibration);
        assert_eq!(tracker.context().reference, Some(Vector2d::new(50., 50.)));
    }

    #[test]
    fn test_zero_width_keeps_calibration() {
        let mut tracker = Tracker::new(&Config::default());
        tracker.process(0., &[target_at(50., 50.)]);
        let flat = DetectedMarker::from_corners(TARGET, [Vector2d::new(60., 60.); 4]);
        tracker.process(0.1, &[flat]);
        assert_eq!(tracker.context().calibration.pixels_per_mm(), Some(200. / 38.1));
    }

    #[test]
    fn test_set_center_rejected_without_target() {
        let mut tracker = Tracker::new(&Config::default());
        tracker.process(0., &[target_at(50., 50.)]);
        tracker.process(0.1, &[]);
        assert_eq!(tracker.set_center(), Err(CenterRejected::TargetNotVisible));
        assert!(tracker.context().reference.is_none());
        assert!(tracker.handle(Command::SetCenter));
        assert!(tracker.context().reference.is_none());
    }

    #[test]
    fn test_reset_and_quit() {
        let mut tracker = Tracker::new(&Config::default());
        tracker.process(0., &[target_at(50., 50.)]);
        assert!(tracker.handle(Command::SetCenter));
        tracker.process(0.1, &[target_at(50., 50.)]);
        assert!(tracker.context().reference.is_some());

        assert!(tracker.handle(Command::ResetCenter));
        assert!(tracker.context().reference.is_none());
        assert!(tracker.context().history.is_empty());
        assert!(tracker.context().last_movement.is_none());
        assert!(tracker.context().calibration.is_set());

        assert!(!tracker.handle(Command::Quit));
    }

    #[test]
    fn test_unordered_frame_discarded() {
        let mut tracker = Tracker::new(&Config::default());
        tracker.process(1., &[target_at(50., 50.)]);
        assert!(tracker.process(0.5, &[target_at(90., 50.)]).is_none());
        assert_eq!(tracker.context().history.len(), 1);
    }

    #[test]
    fn test_scenario_dual_marker_reacquire() {
        let mut tracker = Tracker::new(&dual_config());
        let report = tracker.process(0., &[center_at(100., 100.), target_at(300., 100.)]).unwrap();
        assert_eq!(report.reference_update, ReferenceUpdate::Acquired(Vector2d::new(100., 100.)));
        assert!(report.center_marker.is_some());
        assert!(report.automatic);

        let report = tracker.process(0.1, &[center_at(105., 103.), target_at(300., 100.)]).unwrap();
        assert_eq!(report.reference_update, ReferenceUpdate::Unchanged);
        assert_eq!(report.reference, Some(Vector2d::new(100., 100.)));
        assert_eq!(tracker.context().history.len(), 2);

        let report = tracker.process(0.2, &[target_at(300., 100.), center_at(120., 130.)]).unwrap();
        assert!(matches!(report.reference_update, ReferenceUpdate::Reacquired { .. }));
        assert_eq!(report.reference, Some(Vector2d::new(120., 130.)));
        // cleared, then this frame's target sample
        assert_eq!(tracker.context().history.len(), 1);
        assert_eq!(report.movement, Some(Movement::First));
        assert_eq!(tracker.context().last_movement, Some(0.2));
    }

    #[test]
    fn test_dual_marker_jitter_keeps_history() {
        let mut tracker = Tracker::new(&dual_config());
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(11);
        tracker.process(0., &[center_at(100., 100.), target_at(400., 100.)]);
        for i in 1..90 {
            // at most 7.1 px from the stored reference
            let cx = 100. + rng.gen_range(-5.0..5.0);
            let cy = 100. + rng.gen_range(-5.0..5.0);
            let report = tracker
                .process(i as f64 / FPS, &[center_at(cx, cy), target_at(400., 100.)])
                .unwrap();
            assert_eq!(report.reference_update, ReferenceUpdate::Unchanged);
        }
        assert_eq!(tracker.context().reference, Some(Vector2d::new(100., 100.)));
        let report = tracker.process(3.0, &[center_at(100., 100.), target_at(400., 100.)]).unwrap();
        assert_eq!(report.status.unwrap().motion, Motion::Still);
        assert!(report.still_for > 2.9);
    }

    #[test]
    fn test_dual_marker_rejects_set_center() {
        let mut tracker = Tracker::new(&dual_config());
        tracker.process(0., &[target_at(300., 100.)]);
        assert_eq!(tracker.set_center(), Err(CenterRejected::AutomaticMode));
        tracker.process(0.1, &[center_at(10., 10.), target_at(300., 100.)]);
        tracker.reset_center();
        assert!(tracker.context().reference.is_none());
        let report = tracker.process(0.2, &[center_at(10., 10.), target_at(300., 100.)]).unwrap();
        assert_eq!(report.reference_update, ReferenceUpdate::Acquired(Vector2d::new(10., 10.)));
    }

    #[test]
    fn test_display_unit_only_affects_presentation() {
        let config = Config {
            unit: MeasurementUnit::Centimeter,
            ..Config::default()
        };
        let mut tracker = Tracker::new(&config);
        tracker.process(0., &[target_at(100., 100.)]);
        tracker.set_center().unwrap();
        // 2 mm worth of pixels at 200 / 38.1 px per mm
        let report = tracker.process(0.1, &[target_at(100. + 2. * 200. / 38.1, 100.)]).unwrap();
        assert!((report.displacement.unwrap().total - 2.).abs() < 1e-9);
        assert!((report.display_displacement().unwrap().total - 0.2).abs() < 1e-9);
        assert_eq!(report.status.unwrap().alignment, Alignment::Centered);
    }

    #[test]
    fn test_full_reset_clears_calibration() {
        let mut tracker = Tracker::new(&Config::default());
        tracker.process(0., &[target_at(100., 100.)]);
        tracker.context.reset();
        assert!(!tracker.context().calibration.is_set());
    }
}
