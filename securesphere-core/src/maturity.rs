//! Maturity levels and banding

use std::fmt;

use serde::{Serialize, Serializer};

/// Five-step maturity scale
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MaturityLevel {
    Initial = 1,
    Developing = 2,
    Defined = 3,
    Managed = 4,
    Optimized = 5,
}

impl MaturityLevel {
    pub const ALL: [MaturityLevel; 5] = [
        Self::Initial,
        Self::Developing,
        Self::Defined,
        Self::Managed,
        Self::Optimized,
    ];

    /// Level for an average score. A score at or above a threshold
    /// (1.5, 2.5, 3.5, 4.5) moves up one level.
    pub fn from_score(score: f64) -> Self {
        if score >= 4.5 {
            Self::Optimized
        } else if score >= 3.5 {
            Self::Managed
        } else if score >= 2.5 {
            Self::Defined
        } else if score >= 1.5 {
            Self::Developing
        } else {
            Self::Initial
        }
    }

    pub fn from_number(n: u8) -> Option<Self> {
        Self::ALL.get(usize::from(n).checked_sub(1)?).copied()
    }

    pub fn number(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Initial => "Initial",
            Self::Developing => "Developing",
            Self::Defined => "Defined",
            Self::Managed => "Managed",
            Self::Optimized => "Optimized",
        }
    }

    /// Full label, e.g. `Level 3 - Defined`
    pub fn label(self) -> String {
        format!("Level {} - {}", self.number(), self.name())
    }
}

impl fmt::Display for MaturityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Level {} - {}", self.number(), self.name())
    }
}

impl Serialize for MaturityLevel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Headline band for an overall score: nearest whole level in 1..=5,
/// with 1 for an empty assessment.
pub fn maturity_band(overall: f64) -> u8 {
    if overall <= 0.0 || overall.is_nan() {
        return 1;
    }
    overall.round().clamp(1.0, 5.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thresholds_move_up_a_level() {
        assert_eq!(MaturityLevel::from_score(0.0), MaturityLevel::Initial);
        assert_eq!(MaturityLevel::from_score(1.49), MaturityLevel::Initial);
        assert_eq!(MaturityLevel::from_score(1.5), MaturityLevel::Developing);
        assert_eq!(MaturityLevel::from_score(2.5), MaturityLevel::Defined);
        assert_eq!(MaturityLevel::from_score(3.5), MaturityLevel::Managed);
        assert_eq!(MaturityLevel::from_score(4.49), MaturityLevel::Managed);
        assert_eq!(MaturityLevel::from_score(4.5), MaturityLevel::Optimized);
        assert_eq!(MaturityLevel::from_score(5.0), MaturityLevel::Optimized);
    }

    #[test]
    fn labels() {
        assert_eq!(MaturityLevel::Defined.label(), "Level 3 - Defined");
        assert_eq!(MaturityLevel::Optimized.to_string(), "Level 5 - Optimized");
        assert_eq!(
            serde_json::to_value(MaturityLevel::Initial).unwrap(),
            serde_json::json!("Level 1 - Initial")
        );
    }

    #[test]
    fn from_number_bounds() {
        assert_eq!(MaturityLevel::from_number(0), None);
        assert_eq!(MaturityLevel::from_number(1), Some(MaturityLevel::Initial));
        assert_eq!(MaturityLevel::from_number(5), Some(MaturityLevel::Optimized));
        assert_eq!(MaturityLevel::from_number(6), None);
    }

    #[test]
    fn band_rounds_and_clamps() {
        assert_eq!(maturity_band(0.0), 1);
        assert_eq!(maturity_band(0.4), 1);
        assert_eq!(maturity_band(2.49), 2);
        assert_eq!(maturity_band(2.5), 3);
        assert_eq!(maturity_band(4.8), 5);
    }
}
