use anyhow::{Context as AnyhowContext, Result};
use opencv::core::{Mat, Point2f, Vector};
use opencv::objdetect::QRCodeDetector;
use opencv::prelude::*;

use crate::marker::DetectedMarker;
use crate::my_types::*;

/// Turns an image into the markers visible in it. An empty result is normal.
pub trait MarkerDetector<I> {
    fn detect(&mut self, image: &I) -> Result<Vec<DetectedMarker>>;
}

/// QR codes through OpenCV's multi-code detector.
pub struct QrDetector {
    inner: QRCodeDetector,
    decoded: Vector<String>,
    points: Vector<Point2f>,
    straight: Vector<Mat>,
}

impl QrDetector {
    pub fn new() -> Result<Self> {
        Ok(Self {
            inner: QRCodeDetector::default().context("Failed to create QR code detector")?,
            decoded: Vector::new(),
            points: Vector::new(),
            straight: Vector::new(),
        })
    }
}

impl MarkerDetector<Mat> for QrDetector {
    fn detect(&mut self, image: &Mat) -> Result<Vec<DetectedMarker>> {
        self.decoded.clear();
        self.points.clear();
        let found = self.inner.detect_and_decode_multi(
            image,
            &mut self.decoded,
            &mut self.points,
            &mut self.straight,
        )?;
        if !found {
            return Ok(vec![]);
        }

        // one quadrangle of four vertices per code
        let points: Vec<Vector2d> = self
            .points
            .iter()
            .map(|p| Vector2d::new(p.x as f64, p.y as f64))
            .collect();
        let markers = self
            .decoded
            .iter()
            .zip(points.chunks_exact(4))
            .filter(|(payload, _)| !payload.is_empty())
            .map(|(payload, quad)| {
                DetectedMarker::from_corners(payload, [quad[0], quad[1], quad[2], quad[3]])
            })
            .collect();
        Ok(markers)
    }
}

/// Passes through detections that were recorded with the frame.
#[derive(Debug, Default)]
pub struct RecordedDetector;

impl MarkerDetector<Vec<DetectedMarker>> for RecordedDetector {
    fn detect(&mut self, image: &Vec<DetectedMarker>) -> Result<Vec<DetectedMarker>> {
        Ok(image.clone())
    }
}
