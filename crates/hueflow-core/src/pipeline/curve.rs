//! Contrast curves
//!
//! Every curve is monotonic on [0, 1] with `curve(0) = 0` and `curve(1) = 1`.

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 1-D shaping function applied by the Contrast stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Curve {
    /// Identity
    #[default]
    Linear,
    /// Smoothstep: 3t² - 2t³
    Cubic,
    /// Smootherstep: 6t⁵ - 15t⁴ + 10t³
    Quintic,
    /// t²
    EaseIn,
    /// 1 - (1 - t)²
    EaseOut,
}

impl Curve {
    /// All known curves
    pub const ALL: [Curve; 5] = [
        Curve::Linear,
        Curve::Cubic,
        Curve::Quintic,
        Curve::EaseIn,
        Curve::EaseOut,
    ];

    /// Evaluate the curve. Input is clamped to [0, 1].
    pub fn apply(self, value: f32) -> f32 {
        let t = value.clamp(0.0, 1.0);
        match self {
            Curve::Linear => t,
            Curve::Cubic => t * t * (3.0 - 2.0 * t),
            Curve::Quintic => t * t * t * (t * (t * 6.0 - 15.0) + 10.0),
            Curve::EaseIn => t * t,
            Curve::EaseOut => 1.0 - (1.0 - t) * (1.0 - t),
        }
    }

    /// Config name of the curve
    pub fn name(self) -> &'static str {
        match self {
            Curve::Linear => "linear",
            Curve::Cubic => "cubic",
            Curve::Quintic => "quintic",
            Curve::EaseIn => "ease_in",
            Curve::EaseOut => "ease_out",
        }
    }
}

impl fmt::Display for Curve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Curve {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "linear" => Ok(Curve::Linear),
            "cubic" | "smoothstep" => Ok(Curve::Cubic),
            "quintic" | "smootherstep" => Ok(Curve::Quintic),
            "ease_in" | "easein" => Ok(Curve::EaseIn),
            "ease_out" | "easeout" => Ok(Curve::EaseOut),
            _ => Err(CoreError::config(format!("Unknown contrast function '{}'", s))),
        }
    }
}
