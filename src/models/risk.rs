use serde::{Deserialize, Serialize};

/// Probability of precipitation at or above which an umbrella is needed
pub const UMBRELLA_THRESHOLD: f64 = 0.5;

/// Lower threshold that only marks an hour as "rain possible" in status output
pub const INFO_THRESHOLD: f64 = 0.25;

/// Span of hour offsets (inclusive) covering every hour at or above the decision threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskWindow {
    pub start: u32,
    pub end: u32,
}

impl RiskWindow {
    pub fn contains(&self, hour_offset: u32) -> bool {
        (self.start..=self.end).contains(&hour_offset)
    }

    pub fn hours(&self) -> u32 {
        self.end - self.start + 1
    }
}

/// Result of evaluating a 12-hour forecast
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskSummary {
    pub probabilities: Vec<f64>,
    pub volumes_inches: Vec<f64>,
    pub needs_umbrella: bool,
    pub risk_window: Option<RiskWindow>,
}

impl RiskSummary {
    pub fn peak_probability(&self) -> f64 {
        self.probabilities.iter().copied().fold(0.0, f64::max)
    }

    pub fn total_volume_inches(&self) -> f64 {
        self.volumes_inches.iter().sum()
    }

    pub fn headline(&self) -> &'static str {
        if self.needs_umbrella {
            "Bring an umbrella today!"
        } else {
            "No umbrella needed today."
        }
    }
}

/// Why no risk summary could be produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Unavailable {
    NoLocation,
    FetchFailed(String),
    Incomplete { received: usize },
}

impl Unavailable {
    pub fn as_str(&self) -> &'static str {
        match self {
            Unavailable::NoLocation => "Waiting for location",
            Unavailable::FetchFailed(_) => "Forecast fetch failed",
            Unavailable::Incomplete { .. } => "Forecast incomplete",
        }
    }
}

impl std::fmt::Display for Unavailable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Unavailable::NoLocation => write!(f, "{}", self.as_str()),
            Unavailable::FetchFailed(reason) => write!(f, "{}: {}", self.as_str(), reason),
            Unavailable::Incomplete { received } => {
                write!(f, "{} ({} hours received)", self.as_str(), received)
            }
        }
    }
}

/// Either a fresh risk summary or the reason there is none
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ForecastOutcome {
    Available(RiskSummary),
    Unavailable(Unavailable),
}

impl ForecastOutcome {
    pub fn summary(&self) -> Option<&RiskSummary> {
        match self {
            ForecastOutcome::Available(summary) => Some(summary),
            ForecastOutcome::Unavailable(_) => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, ForecastOutcome::Available(_))
    }

    pub fn headline(&self) -> &'static str {
        match self {
            ForecastOutcome::Available(summary) => summary.headline(),
            ForecastOutcome::Unavailable(_) => "Sorry, couldn't get a rain forecast.",
        }
    }
}
