//! Parameter calculators behind the interactive widgets.
//!
//! All functions are pure. Unparseable input becomes `None` and is shown as a
//! dash; nothing here returns an error.

use serde::Serialize;

/// Shown in place of a value that could not be computed.
pub const PLACEHOLDER: &str = "-";

/// Permissive numeric parsing: trims, accepts a leading `+`, rejects NaN/inf.
pub fn parse_number(input: &str) -> Option<f64> {
  let s = input.trim();
  if s.is_empty() {
    return None;
  }
  s.parse::<f64>().ok().filter(|v| v.is_finite())
}

pub fn format_display(value: Option<f64>, decimals: usize) -> String {
  match value {
    Some(v) if v.is_finite() => format!("{v:.decimals$}"),
    _ => PLACEHOLDER.to_string(),
  }
}

/// `z = (x - mean) / sd`. A zero or non-finite spread yields `None`.
pub fn z_score(x: f64, mean: f64, sd: f64) -> Option<f64> {
  if sd == 0.0 || !sd.is_finite() {
    return None;
  }
  Some((x - mean) / sd).filter(|z| z.is_finite())
}

pub fn interpret_z(z: f64) -> &'static str {
  if z > 3.0 {
    "Extremely high - very rare (>99.9%)"
  } else if z > 2.0 {
    "Very high - top 2.5%"
  } else if z > 1.0 {
    "Above average - top 16%"
  } else if z > 0.0 {
    "Slightly above average"
  } else if z > -1.0 {
    "Slightly below average"
  } else if z > -2.0 {
    "Below average - bottom 16%"
  } else if z > -3.0 {
    "Very low - bottom 2.5%"
  } else {
    "Extremely low - very rare (<0.1%)"
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Interval {
  pub lower: f64,
  pub estimate: f64,
  pub upper: f64,
}

impl Interval {
  #[allow(dead_code)]
  pub fn width(&self) -> f64 {
    self.upper - self.lower
  }
}

/// `estimate ± base_width * (1 + |x - center_x| * growth)`: bands widen away
/// from the center of the data.
pub fn interval(estimate: f64, x: f64, center_x: f64, base_width: f64, growth: f64) -> Interval {
  let half = base_width * (1.0 + (x - center_x).abs() * growth);
  Interval { lower: estimate - half, estimate, upper: estimate + half }
}

/// Simple regression line with the confidence/prediction band presets used
/// on the "making predictions" page.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct RegressionBands {
  pub slope: f64,
  pub intercept: f64,
  pub center_x: f64,
}

impl RegressionBands {
  pub const CONFIDENCE_BASE: f64 = 0.8;
  pub const CONFIDENCE_GROWTH: f64 = 0.1;
  pub const PREDICTION_BASE: f64 = 1.8;
  pub const PREDICTION_GROWTH: f64 = 0.15;

  /// Line fitted to the page's example points (x = 2..=10).
  pub fn example() -> Self {
    let xs = [2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0];
    let center_x = xs.iter().sum::<f64>() / xs.len() as f64;
    Self { slope: 0.7, intercept: 1.5, center_x }
  }

  pub fn predict(&self, x: f64) -> f64 {
    self.slope * x + self.intercept
  }

  pub fn confidence(&self, x: f64) -> Interval {
    interval(self.predict(x), x, self.center_x, Self::CONFIDENCE_BASE, Self::CONFIDENCE_GROWTH)
  }

  pub fn prediction(&self, x: f64) -> Interval {
    interval(self.predict(x), x, self.center_x, Self::PREDICTION_BASE, Self::PREDICTION_GROWTH)
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Point {
  pub x: f64,
  pub y: f64,
}

pub fn power_transform(points: &[Point], x_power: f64, y_power: f64) -> Vec<Point> {
  points
    .iter()
    .map(|p| Point { x: p.x.powf(x_power), y: p.y.powf(y_power) })
    .collect()
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct TransformPreset {
  pub name: &'static str,
  pub label: &'static str,
  pub x_power: f64,
  pub y_power: f64,
  pub r_squared: f64,
}

pub const TRANSFORM_PRESETS: [TransformPreset; 3] = [
  TransformPreset { name: "none", label: "No Transformation", x_power: 1.0, y_power: 1.0, r_squared: 0.758 },
  TransformPreset {
    name: "moderate",
    label: "Moderate Transformation (x^-1, y^-0.5)",
    x_power: -1.0,
    y_power: -0.5,
    r_squared: 0.883,
  },
  TransformPreset {
    name: "best",
    label: "Best Transformation (x^-2.25, y^-0.75)",
    x_power: -2.25,
    y_power: -0.75,
    r_squared: 0.951,
  },
];

pub fn transform_preset(name: &str) -> Option<&'static TransformPreset> {
  TRANSFORM_PRESETS.iter().find(|p| p.name == name)
}

/// Abalone-like curved sample used by the transformation widget.
pub fn transformation_sample() -> Vec<Point> {
  [
    (0.2, 0.001),
    (0.25, 0.002),
    (0.3, 0.004),
    (0.35, 0.007),
    (0.4, 0.012),
    (0.45, 0.018),
    (0.5, 0.025),
    (0.55, 0.035),
    (0.6, 0.048),
    (0.65, 0.065),
  ]
  .into_iter()
  .map(|(x, y)| Point { x, y })
  .collect()
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct EmpiricalBand {
  pub k: u8,
  pub coverage: f64,
  pub lower: f64,
  pub upper: f64,
}

/// The 68-95-99.7 bands `mean ± k·sd`.
pub fn empirical_rule(mean: f64, sd: f64) -> Option<[EmpiricalBand; 3]> {
  if !(sd.is_finite() && sd > 0.0 && mean.is_finite()) {
    return None;
  }
  let band = |k: u8, coverage: f64| EmpiricalBand {
    k,
    coverage,
    lower: mean - f64::from(k) * sd,
    upper: mean + f64::from(k) * sd,
  };
  Some([band(1, 68.0), band(2, 95.0), band(3, 99.7)])
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn z_score_of_iq_example_is_one() {
    let z = z_score(115.0, 100.0, 15.0);
    assert_eq!(z, Some(1.0));
    assert_eq!(format_display(z, 2), "1.00");
    assert_eq!(z_score(115.0, 100.0, 15.0).map(f64::to_bits), z.map(f64::to_bits));
  }

  #[test]
  fn bad_input_renders_placeholder() {
    assert_eq!(parse_number(" 12.5 "), Some(12.5));
    assert_eq!(parse_number("+3"), Some(3.0));
    assert_eq!(parse_number("abc"), None);
    assert_eq!(parse_number(""), None);
    assert_eq!(parse_number("NaN"), None);
    assert_eq!(format_display(z_score(1.0, 0.0, 0.0), 2), PLACEHOLDER);
  }

  #[test]
  fn interpretation_bands() {
    assert_eq!(interpret_z(2.5), "Very high - top 2.5%");
    assert_eq!(interpret_z(-1.5), "Below average - bottom 16%");
    assert_eq!(interpret_z(0.0), "Slightly below average");
  }

  #[test]
  fn prediction_band_is_wider_and_grows_from_center() {
    let line = RegressionBands::example();
    assert_eq!(line.center_x, 6.0);
    let at_center = line.confidence(6.0);
    assert!((at_center.width() - 1.6).abs() < 1e-12);
    assert!(line.prediction(6.0).width() > at_center.width());
    assert!(line.confidence(10.0).width() > at_center.width());
    let p = line.prediction(10.0);
    assert!((p.upper - (8.5 + 1.8 * 1.6)).abs() < 1e-12);
  }

  #[test]
  fn power_transform_applies_both_exponents() {
    let out = power_transform(&[Point { x: 4.0, y: 8.0 }], 0.5, -1.0);
    assert_eq!(out.len(), 1);
    assert!((out[0].x - 2.0).abs() < 1e-12);
    assert!((out[0].y - 0.125).abs() < 1e-12);
    assert_eq!(transform_preset("best").map(|p| p.r_squared), Some(0.951));
    assert!(transform_preset("log").is_none());
  }

  #[test]
  fn empirical_bands() {
    let bands = empirical_rule(100.0, 15.0).unwrap();
    assert_eq!((bands[1].lower, bands[1].upper), (70.0, 130.0));
    assert!(empirical_rule(0.0, 0.0).is_none());
  }
}
