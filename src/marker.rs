use crate::my_types::*;

/// A decoded fiducial marker as reported by a [`crate::detector::MarkerDetector`].
#[derive(Clone, Debug, PartialEq)]
pub struct DetectedMarker {
    pub payload: String,
    /// Quadrangle vertices in detector order, corner 0 to corner 1 is the top edge.
    pub corners: [Vector2d; 4],
    pub center: Vector2d,
    /// Length of the top edge in pixels
    pub pixel_width: f64,
}

impl DetectedMarker {
    pub fn from_corners(payload: impl Into<String>, corners: [Vector2d; 4]) -> Self {
        let center = corners.iter().sum::<Vector2d>() / 4.;
        let pixel_width = (corners[0] - corners[1]).norm();
        Self {
            payload: payload.into(),
            corners,
            center,
            pixel_width,
        }
    }

    /// Axis aligned square marker, handy for synthetic input.
    pub fn square(payload: impl Into<String>, center: Vector2d, side: f64) -> Self {
        let h = side / 2.;
        Self::from_corners(
            payload,
            [
                center + Vector2d::new(-h, -h),
                center + Vector2d::new(h, -h),
                center + Vector2d::new(h, h),
                center + Vector2d::new(-h, h),
            ],
        )
    }
}

/// First marker carrying `payload`, in detection order.
pub fn find_marker<'a>(markers: &'a [DetectedMarker], payload: &str) -> Option<&'a DetectedMarker> {
    markers.iter().find(|m| m.payload == payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geometry_from_corners() {
        let marker = DetectedMarker::from_corners(
            "a",
            [
                Vector2d::new(10., 10.),
                Vector2d::new(40., 14.),
                Vector2d::new(36., 44.),
                Vector2d::new(6., 40.),
            ],
        );
        assert!((marker.center - Vector2d::new(23., 27.)).norm() < 1e-12);
        assert!((marker.pixel_width - 916_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_square() {
        let marker = DetectedMarker::square("a", Vector2d::new(100., 50.), 200.);
        assert_eq!(marker.pixel_width, 200.);
        assert_eq!(marker.center, Vector2d::new(100., 50.));
    }

    #[test]
    fn test_find_marker_takes_first() {
        let markers = vec![
            DetectedMarker::square("x", Vector2d::new(0., 0.), 10.),
            DetectedMarker::square("t", Vector2d::new(1., 0.), 10.),
            DetectedMarker::square("t", Vector2d::new(2., 0.), 10.),
        ];
        assert_eq!(find_marker(&markers, "t").unwrap().center.x, 1.);
        assert!(find_marker(&markers, "missing").is_none());
    }
}
