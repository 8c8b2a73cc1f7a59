use serde::{Deserialize, Serialize};

/// Score at or above which a student is in the low-risk band.
pub const LOW_RISK_SCORE: f64 = 80.0;
/// Score below which a student is in the high-risk band.
pub const HIGH_RISK_SCORE: f64 = 70.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RiskTier {
    Low,
    Medium,
    High,
}

impl RiskTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskTier::Low => "Low",
            RiskTier::Medium => "Medium",
            RiskTier::High => "High",
        }
    }

    /// Row band used by the render layer for a score tier.
    pub fn row_band(&self) -> &'static str {
        match self {
            RiskTier::Low => "",
            RiskTier::Medium => "warning",
            RiskTier::High => "danger",
        }
    }

    /// Score badge style for a score tier.
    pub fn badge_class(&self) -> &'static str {
        match self {
            RiskTier::Low => "bg-success",
            RiskTier::Medium => "bg-warning",
            RiskTier::High => "bg-danger",
        }
    }
}

/// Band an individual score. Total: anything not below 80 (including NaN) is Low.
pub fn classify_score(score: f64) -> RiskTier {
    if score < HIGH_RISK_SCORE {
        RiskTier::High
    } else if score < LOW_RISK_SCORE {
        RiskTier::Medium
    } else {
        RiskTier::Low
    }
}

/// Band the fleet-wide at-risk count reported by the backend.
pub fn classify_aggregate_risk(at_risk_count: u64) -> RiskTier {
    match at_risk_count {
        0..=1 => RiskTier::Low,
        2..=3 => RiskTier::Medium,
        _ => RiskTier::High,
    }
}

pub fn performance_comment(score: f64) -> &'static str {
    if score >= 90.0 {
        "Excellent!"
    } else if score >= 80.0 {
        "Good job!"
    } else if score >= 70.0 {
        "Needs improvement"
    } else if score >= 60.0 {
        "Requires attention"
    } else {
        "High risk!"
    }
}
