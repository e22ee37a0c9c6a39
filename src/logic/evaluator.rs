use crate::error::{Result, UmbrellaError};
use crate::models::{ForecastSample, RiskSummary, RiskWindow, FORECAST_HORIZON_HOURS, UMBRELLA_THRESHOLD};

/// Turns a 12-hour forecast into an umbrella decision
///
/// The risk window spans from the first to the last hour whose probability of
/// precipitation meets the threshold. Hours below the threshold inside that
/// span do not split it.
#[derive(Debug, Clone, Copy)]
pub struct ForecastEvaluator {
    threshold: f64,
}

impl ForecastEvaluator {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn evaluate(&self, samples: &[ForecastSample]) -> Result<RiskSummary> {
        if samples.len() < FORECAST_HORIZON_HOURS {
            return Err(UmbrellaError::Incomplete {
                expected: FORECAST_HORIZON_HOURS,
                received: samples.len(),
            });
        }

        let horizon = &samples[..FORECAST_HORIZON_HOURS];
        let mut probabilities = Vec::with_capacity(FORECAST_HORIZON_HOURS);
        let mut volumes_inches = Vec::with_capacity(FORECAST_HORIZON_HOURS);
        let mut risk_window: Option<RiskWindow> = None;

        for (index, sample) in horizon.iter().enumerate() {
            let hour = index as u32;
            if sample.hour_offset != hour {
                return Err(UmbrellaError::InvalidData(format!(
                    "forecast sample {} has hour offset {}",
                    index, sample.hour_offset
                )));
            }

            probabilities.push(sample.probability_of_precipitation);
            volumes_inches.push(sample.volume_inches());

            if sample.probability_of_precipitation >= self.threshold {
                risk_window = Some(match risk_window {
                    Some(window) => RiskWindow { end: hour, ..window },
                    None => RiskWindow {
                        start: hour,
                        end: hour,
                    },
                });
            }
        }

        Ok(RiskSummary {
            probabilities,
            volumes_inches,
            needs_umbrella: risk_window.is_some(),
            risk_window,
        })
    }
}

impl Default for ForecastEvaluator {
    fn default() -> Self {
        Self::new(UMBRELLA_THRESHOLD)
    }
}
