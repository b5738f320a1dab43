use crate::calibration::CalibrationScale;
use crate::config::MeasurementUnit;
use crate::my_types::*;

/// Offset of the target from the reference, always stored in millimeters.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Displacement {
    pub total: f64,
    pub dx: f64,
    pub dy: f64,
}

impl Displacement {
    pub fn zero() -> Self {
        Self::default()
    }

    /// Rescale for presentation. Classification must use the millimeter value.
    pub fn in_unit(&self, unit: MeasurementUnit) -> Displacement {
        Displacement {
            total: unit.convert_mm(self.total),
            dx: unit.convert_mm(self.dx),
            dy: unit.convert_mm(self.dy),
        }
    }
}

/// Physical offset of `current` from `reference`. Zero when there is no
/// reference or no usable calibration.
pub fn displacement(
    current: Vector2d,
    reference: Option<Vector2d>,
    scale: &CalibrationScale,
) -> Displacement {
    let (reference, ppmm) = match (reference, scale.pixels_per_mm()) {
        (Some(reference), Some(ppmm)) if ppmm > 0. => (reference, ppmm),
        _ => return Displacement::zero(),
    };
    let delta = (current - reference) / ppmm;
    Displacement {
        total: delta.norm(),
        dx: delta.x,
        dy: delta.y,
    }
}
