//! Directional labels and the pattern-recognition bias consumed by fusion.

use serde::{Deserialize, Serialize};

/// Market direction implied by a piece of evidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Bullish,
    Bearish,
    Neutral,
}

impl Direction {
    /// +1 for bullish, -1 for bearish, 0 for neutral.
    pub fn sign(self) -> f64 {
        match self {
            Direction::Bullish => 1.0,
            Direction::Bearish => -1.0,
            Direction::Neutral => 0.0,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Direction::Bullish => Direction::Bearish,
            Direction::Bearish => Direction::Bullish,
            Direction::Neutral => Direction::Neutral,
        }
    }

    pub fn is_directional(self) -> bool {
        self != Direction::Neutral
    }
}

/// Chart-pattern bias reported by the pattern-recognition collaborator.
///
/// `confidence` is in [0, 1]; out-of-range or non-finite input is clamped by `new`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PatternBias {
    pub direction: Direction,
    pub confidence: f64,
}

impl PatternBias {
    pub fn new(direction: Direction, confidence: f64) -> Self {
        let confidence = if confidence.is_finite() {
            confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            direction,
            confidence,
        }
    }

    pub fn neutral() -> Self {
        Self {
            direction: Direction::Neutral,
            confidence: 0.0,
        }
    }

    /// Whether the bias carries any directional information.
    pub fn is_informative(&self) -> bool {
        self.direction.is_directional() && self.confidence > 0.0
    }
}

impl Default for PatternBias {
    fn default() -> Self {
        Self::neutral()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidence_is_clamped() {
        assert_eq!(PatternBias::new(Direction::Bullish, 1.7).confidence, 1.0);
        assert_eq!(PatternBias::new(Direction::Bearish, -0.2).confidence, 0.0);
        assert_eq!(PatternBias::new(Direction::Bearish, f64::NAN).confidence, 0.0);
    }

    #[test]
    fn neutral_bias_is_not_informative() {
        assert!(!PatternBias::neutral().is_informative());
        assert!(!PatternBias::new(Direction::Bullish, 0.0).is_informative());
        assert!(PatternBias::new(Direction::Bullish, 0.4).is_informative());
    }

    #[test]
    fn opposite_flips_direction() {
        assert_eq!(Direction::Bullish.opposite(), Direction::Bearish);
        assert_eq!(Direction::Neutral.opposite(), Direction::Neutral);
    }
}
