//! Two-point affine calibration between joint degrees and drive counts.
//!
//! `raw = A·deg + B`, `deg = (raw − B) / A`. Coefficients are computed on
//! first use and cached; after a successful computation `A != 0`.

use exo_common::robot::CalibrationPoints;
use std::cell::OnceCell;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CalibrationError {
    /// Reference points coincide in one coordinate.
    #[error("degenerate calibration points {0:?}")]
    Degenerate(CalibrationPoints),

    /// Input is NaN or infinite.
    #[error("non-finite value {0}")]
    NonFinite(f64),

    /// Converted value does not fit a 32-bit drive count.
    #[error("{0} counts exceed the drive range")]
    RawOverflow(f64),
}

/// Lazily evaluated affine map for one joint.
#[derive(Debug, Clone)]
pub struct Calibration {
    points: CalibrationPoints,
    coefficients: OnceCell<(f64, f64)>,
}

impl Calibration {
    pub fn new(points: CalibrationPoints) -> Self {
        Self {
            points,
            coefficients: OnceCell::new(),
        }
    }

    pub fn points(&self) -> &CalibrationPoints {
        &self.points
    }

    /// `(A, B)`, computed on first call.
    pub fn coefficients(&self) -> Result<(f64, f64), CalibrationError> {
        if let Some(c) = self.coefficients.get() {
            return Ok(*c);
        }

        let p = &self.points;
        if p.is_degenerate() {
            return Err(CalibrationError::Degenerate(*p));
        }
        let (x1, y1) = (p.deg_a, f64::from(p.raw_a));
        let (x2, y2) = (p.deg_b, f64::from(p.raw_b));
        let a = (y2 - y1) / (x2 - x1);
        let b = (y1 * x2 - y2 * x1) / (x2 - x1);

        Ok(*self.coefficients.get_or_init(|| (a, b)))
    }

    /// Degrees → drive counts (rounded to nearest).
    pub fn to_drive_units(&self, deg: f64) -> Result<i32, CalibrationError> {
        if !deg.is_finite() {
            return Err(CalibrationError::NonFinite(deg));
        }
        let (a, b) = self.coefficients()?;
        let raw = (a * deg + b).round();
        if raw < f64::from(i32::MIN) || raw > f64::from(i32::MAX) {
            return Err(CalibrationError::RawOverflow(raw));
        }
        Ok(raw as i32)
    }

    /// Drive counts → degrees.
    pub fn from_drive_units(&self, raw: i32) -> Result<f64, CalibrationError> {
        let (a, b) = self.coefficients()?;
        Ok((f64::from(raw) - b) / a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KNEE_LIKE: CalibrationPoints = CalibrationPoints {
        raw_a: 250_880,
        deg_a: 90.0,
        raw_b: 0,
        deg_b: 0.0,
    };

    #[test]
    fn knee_reference_values() {
        let cal = Calibration::new(KNEE_LIKE);
        assert_eq!(cal.to_drive_units(45.0).unwrap(), 125_440);
        assert!((cal.from_drive_units(125_440).unwrap() - 45.0).abs() < 1e-9);
    }

    #[test]
    fn hip_maps_reference_points_exactly() {
        let cal = Calibration::new(CalibrationPoints::HIP);
        assert_eq!(cal.to_drive_units(90.0).unwrap(), 250_880);
        assert_eq!(cal.to_drive_units(180.0).unwrap(), 0);
        let (a, _) = cal.coefficients().unwrap();
        assert!(a < 0.0);
    }

    #[test]
    fn ankle_has_negative_counts() {
        let cal = Calibration::new(CalibrationPoints::ANKLE);
        assert_eq!(cal.to_drive_units(90.0).unwrap(), 0);
        assert_eq!(cal.to_drive_units(115.0).unwrap(), -800_000);
        assert!((cal.from_drive_units(-400_000).unwrap() - 102.5).abs() < 1e-9);
    }

    #[test]
    fn round_trips_within_tolerance() {
        for points in [
            CalibrationPoints::HIP,
            CalibrationPoints::KNEE,
            CalibrationPoints::ANKLE,
            CalibrationPoints {
                raw_a: -1_000,
                deg_a: -30.0,
                raw_b: 7_777,
                deg_b: 12.5,
            },
        ] {
            let cal = Calibration::new(points);
            let (a, _) = cal.coefficients().unwrap();
            for raw in [-500_000, -1, 0, 1, 12_345, 250_880] {
                let deg = cal.from_drive_units(raw).unwrap();
                assert_eq!(cal.to_drive_units(deg).unwrap(), raw);
            }
            for deg in [-10.0, 0.0, 33.3, 90.0, 179.9] {
                let raw = cal.to_drive_units(deg).unwrap();
                let back = cal.from_drive_units(raw).unwrap();
                // Rounding to whole counts costs at most half a count.
                assert!((back - deg).abs() <= 0.5 / a.abs() + 1e-9);
            }
        }
    }

    #[test]
    fn degenerate_points_rejected() {
        let cal = Calibration::new(CalibrationPoints {
            raw_a: 10,
            deg_a: 5.0,
            raw_b: 20,
            deg_b: 5.0,
        });
        assert!(matches!(
            cal.to_drive_units(1.0),
            Err(CalibrationError::Degenerate(_))
        ));
        assert!(cal.coefficients.get().is_none());
    }

    #[test]
    fn non_finite_and_overflow() {
        let cal = Calibration::new(KNEE_LIKE);
        assert!(matches!(
            cal.to_drive_units(f64::NAN),
            Err(CalibrationError::NonFinite(_))
        ));
        assert!(matches!(
            cal.to_drive_units(1.0e9),
            Err(CalibrationError::RawOverflow(_))
        ));
    }
}
