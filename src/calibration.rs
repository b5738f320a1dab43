/// Pixels per millimeter, learned from a marker of known printed width.
///
/// Once a positive scale is known it is only ever replaced by another positive
/// scale; [`CalibrationScale::clear`] is reserved for a full context reset.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CalibrationScale {
    pixels_per_mm: Option<f64>,
}

impl CalibrationScale {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recompute the scale from the observed marker width. Zero, negative or
    /// non-finite measurements leave the previous scale in place.
    pub fn update(&mut self, pixel_width: f64, physical_width_mm: f64) -> bool {
        if !(pixel_width.is_finite() && pixel_width > 0.) {
            return false;
        }
        if !(physical_width_mm.is_finite() && physical_width_mm > 0.) {
            return false;
        }
        self.pixels_per_mm = Some(pixel_width / physical_width_mm);
        true
    }

    pub fn pixels_per_mm(&self) -> Option<f64> {
        self.pixels_per_mm
    }

    pub fn is_set(&self) -> bool {
        self.pixels_per_mm.is_some()
    }

    /// Convert a pixel distance to millimeters, `None` while uncalibrated.
    pub fn to_mm(&self, pixels: f64) -> Option<f64> {
        match self.pixels_per_mm {
            Some(scale) if scale > 0. => Some(pixels / scale),
            _ => None,
        }
    }

    pub fn clear(&mut self) {
        self.pixels_per_mm = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update() {
        let mut scale = CalibrationScale::new();
        assert!(!scale.is_set());
        assert!(scale.update(200., 38.1));
        let ppmm = scale.pixels_per_mm().unwrap();
        assert_eq!(ppmm, 200. / 38.1);
        assert!((ppmm - 5.249).abs() < 1e-3);
        assert!((scale.to_mm(26.).unwrap() - 4.953).abs() < 1e-3);
    }

    #[test]
    fn test_zero_width_keeps_previous() {
        let mut scale = CalibrationScale::new();
        assert!(!scale.update(0., 38.1));
        assert!(scale.to_mm(5.).is_none());

        scale.update(100., 50.);
        assert!(!scale.update(0., 50.));
        assert!(!scale.update(f64::NAN, 50.));
        assert_eq!(scale.pixels_per_mm(), Some(2.));
    }

    #[test]
    fn test_always_positive() {
        let mut scale = CalibrationScale::new();
        for w in [0.5, 1., 17.25, 200., 4096.] {
            for width_mm in [0.1, 38.1, 1000.] {
                scale.update(w, width_mm);
                assert_eq!(scale.pixels_per_mm(), Some(w / width_mm));
                assert!(scale.pixels_per_mm().unwrap() > 0.);
            }
        }
    }
}
