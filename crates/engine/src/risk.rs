//! Risk bands for a position's utilization.
//!
//! The borrowed fraction of capacity is bucketed at 0.3 / 0.5 / 0.7 / 0.85 / 1.0.

use serde::{Deserialize, Serialize};

use crate::calculations::{EPSILON, Utilization};

/// Upper bounds (exclusive) of each band, as a fraction of capacity.
const SAFE_BELOW: f64 = 0.3;
const MODERATE_BELOW: f64 = 0.5;
const ELEVATED_BELOW: f64 = 0.7;
const HIGH_BELOW: f64 = 0.85;
const CRITICAL_BELOW: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskBand {
    Safe,
    Moderate,
    Elevated,
    High,
    Critical,
    /// At or beyond the borrowing capacity.
    AtLimit,
    /// Borrowing against zero capacity.
    Unbounded,
}

impl RiskBand {
    pub fn from_utilization(utilization: Utilization) -> Self {
        match utilization {
            Utilization::Unbounded => RiskBand::Unbounded,
            Utilization::Ratio { percent } => Self::from_fraction(percent / 100.0),
        }
    }

    fn from_fraction(fraction: f64) -> Self {
        if fraction >= CRITICAL_BELOW - EPSILON {
            RiskBand::AtLimit
        } else if fraction >= HIGH_BELOW {
            RiskBand::Critical
        } else if fraction >= ELEVATED_BELOW {
            RiskBand::High
        } else if fraction >= MODERATE_BELOW {
            RiskBand::Elevated
        } else if fraction >= SAFE_BELOW {
            RiskBand::Moderate
        } else {
            RiskBand::Safe
        }
    }
}

impl std::fmt::Display for RiskBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskBand::Safe => write!(f, "safe"),
            RiskBand::Moderate => write!(f, "moderate"),
            RiskBand::Elevated => write!(f, "elevated"),
            RiskBand::High => write!(f, "high"),
            RiskBand::Critical => write!(f, "critical"),
            RiskBand::AtLimit => write!(f, "at_limit"),
            RiskBand::Unbounded => write!(f, "unbounded"),
        }
    }
}
