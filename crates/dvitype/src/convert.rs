//! Conversion of DVI units to pixels and TFM units.

/// Numerator of the factor converting TFM design units to DVI units, in units of 10^-7 m.
const TFM_NUMERATOR: f64 = 25400000.0;

/// Denominator of the factor converting TFM design units to DVI units.
///
/// This is 7227 * 2^16, the number of scaled points in an inch.
const TFM_DENOMINATOR: f64 = 473628672.0;

/// Conversion factors derived from the preamble and the requested resolution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Conversions {
    pub numerator: i32,
    pub denominator: i32,
    pub mag: i32,
    /// Pixels per DVI unit, ignoring magnification.
    pub true_conv: f64,
    /// Pixels per DVI unit, including magnification.
    pub conv: f64,
    /// DVI units per TFM fix-word unit.
    pub tfm_conv: f64,
}

impl Conversions {
    /// Build the conversion factors.
    ///
    /// The numerator and denominator are the DVI unit in units of 10^-7 m,
    ///     and must be positive.
    pub fn new(numerator: i32, denominator: i32, mag: i32, resolution: f64) -> Conversions {
        let (num, den) = (f64::from(numerator), f64::from(denominator));
        let true_conv = (num / 254000.0) * (resolution / den);
        Conversions {
            numerator,
            denominator,
            mag,
            true_conv,
            conv: true_conv * (f64::from(mag) / 1000.0),
            tfm_conv: (TFM_NUMERATOR / num) * (den / TFM_DENOMINATOR) / 16.0,
        }
    }

    /// Convert DVI units to the nearest whole number of pixels.
    pub fn pixel_round(&self, x: i64) -> i32 {
        round(self.conv * x as f64)
    }

    /// Convert the side of a rule from DVI units to pixels.
    ///
    /// The result is the smallest integer not less than the exact value,
    ///     so that rules are never thinner than their true size.
    pub fn rule_pixels(&self, x: i32) -> i32 {
        let exact = self.conv * f64::from(x);
        let n = exact.trunc();
        if n < exact {
            n as i32 + 1
        } else {
            n as i32
        }
    }

    /// The ratio `conv*q/(true_conv*d)` as a rounded value in the given unit.
    ///
    /// Used to print the magnification of a font as a per mille or percentage.
    pub fn font_ratio(&self, unit: f64, scaled_size: i32, design_size: i32) -> i32 {
        round(
            unit * self.conv * f64::from(scaled_size)
                / (self.true_conv * f64::from(design_size)),
        )
    }

    pub fn tfm_scale(&self, at_size: i32) -> tfm::Scale {
        tfm::Scale {
            at_size,
            tfm_conv: self.tfm_conv,
            conv: self.conv,
        }
    }
}

impl Default for Conversions {
    fn default() -> Self {
        // The units used by TeX.
        Conversions::new(25400000, 473628672, 1000, 300.0)
    }
}

/// Round to the nearest integer, with halves rounded away from zero.
pub fn round(f: f64) -> i32 {
    f.round() as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tex_units() {
        let c = Conversions::default();
        assert!((c.tfm_conv - 1.0 / 16.0).abs() < 1e-12);
        // 300 pixels per inch, 72.27 points per inch, 2^16 scaled points per point.
        assert!((c.conv - 300.0 / 72.27 / 65536.0).abs() < 1e-12);
        assert_eq!(c.pixel_round(72 * 65536), 299);
    }

    #[test]
    fn magnification() {
        let c = Conversions::new(25400000, 473628672, 2000, 300.0);
        assert!((c.conv - 2.0 * c.true_conv).abs() < 1e-15);
        assert_eq!(c.font_ratio(100.0, 10, 10), 200);
    }

    #[test]
    fn round_half_away_from_zero() {
        assert_eq!(round(2.5), 3);
        assert_eq!(round(-2.5), -3);
        assert_eq!(round(2.4999), 2);
        assert_eq!(round(-0.4), 0);
    }

    #[test]
    fn rule_pixels_round_up() {
        // one pixel is 10 DVI units
        let c = Conversions::new(254000, 10, 1000, 1.0);
        assert_eq!(c.rule_pixels(10), 1);
        assert_eq!(c.rule_pixels(11), 2);
        assert_eq!(c.rule_pixels(1), 1);
        assert_eq!(c.rule_pixels(0), 0);
        assert_eq!(c.rule_pixels(-15), -1);
        assert_eq!(c.pixel_round(15), 2);
        assert_eq!(c.pixel_round(-15), -2);
    }
}
