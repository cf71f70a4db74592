//! Safety classification.
//!
//! Rules are evaluated top to bottom and the first match wins:
//!
//! 1. `offline`: no flow value and no usable wind figure
//! 2. `black`: flow > `flow_black`
//! 3. `red`: flow > `flow_red` or wind > `wind_red`
//! 4. `amber`: flow > `flow_amber` or wind > `wind_amber`
//! 5. `green`: otherwise
//!
//! Comparisons are strict, so a value equal to a threshold falls into the
//! band below it. When flow and wind breach the same band, flow is reported.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::model::{FlagLevel, ObservationSnapshot, SafetyAssessment, TriggeringMetric};

/// Per-deployment cutoffs. Flow is in m³/s, wind in the configured wind unit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub flow_amber: f64,
    pub flow_red: f64,
    pub flow_black: f64,
    pub wind_amber: f64,
    pub wind_red: f64,
}

impl Thresholds {
    /// Reject non-finite cutoffs and bands given out of order.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fields = [
            ("flow_amber", self.flow_amber),
            ("flow_red", self.flow_red),
            ("flow_black", self.flow_black),
            ("wind_amber", self.wind_amber),
            ("wind_red", self.wind_red),
        ];
        if let Some((field, _)) = fields.into_iter().find(|(_, v)| !v.is_finite()) {
            return Err(ConfigError::NonFiniteThreshold { field });
        }

        let ordering = [
            (("flow_amber", self.flow_amber), ("flow_red", self.flow_red)),
            (("flow_red", self.flow_red), ("flow_black", self.flow_black)),
            (("wind_amber", self.wind_amber), ("wind_red", self.wind_red)),
        ];
        for ((lower, lower_value), (upper, upper_value)) in ordering {
            if lower_value > upper_value {
                return Err(ConfigError::ThresholdOrder {
                    lower,
                    lower_value,
                    upper,
                    upper_value,
                });
            }
        }

        Ok(())
    }
}

/// Map a snapshot to a flag. Never fails: joint absence of data is the
/// `offline` verdict.
pub fn classify(snapshot: &ObservationSnapshot, thresholds: &Thresholds) -> SafetyAssessment {
    let flow = snapshot.flow();
    let wind = snapshot.wind_metric();
    let wind_unit = snapshot
        .weather
        .as_ref()
        .map_or("", |w| w.wind_unit.label());

    if flow.is_none() && wind.is_none() {
        return SafetyAssessment {
            level: FlagLevel::Offline,
            reason: "No river or wind data available".to_string(),
            triggering_metric: TriggeringMetric::None,
        };
    }

    if let Some(value) = flow.filter(|f| *f > thresholds.flow_black) {
        return breach_assessment(
            FlagLevel::Black,
            Breach::flow(value, thresholds.flow_black),
            wind_unit,
        );
    }

    let bands = [
        (FlagLevel::Red, thresholds.flow_red, thresholds.wind_red),
        (FlagLevel::Amber, thresholds.flow_amber, thresholds.wind_amber),
    ];
    for (level, flow_limit, wind_limit) in bands {
        if let Some(breach) = Breach::find(flow, wind, flow_limit, wind_limit) {
            return breach_assessment(level, breach, wind_unit);
        }
    }

    SafetyAssessment {
        level: FlagLevel::Green,
        reason: green_reason(flow, wind, wind_unit),
        triggering_metric: TriggeringMetric::None,
    }
}

struct Breach {
    metric: TriggeringMetric,
    value: f64,
    limit: f64,
}

impl Breach {
    fn flow(value: f64, limit: f64) -> Self {
        Self {
            metric: TriggeringMetric::Flow,
            value,
            limit,
        }
    }

    fn find(flow: Option<f64>, wind: Option<f64>, flow_limit: f64, wind_limit: f64) -> Option<Self> {
        if let Some(value) = flow.filter(|f| *f > flow_limit) {
            return Some(Self::flow(value, flow_limit));
        }
        wind.filter(|w| *w > wind_limit).map(|value| Self {
            metric: TriggeringMetric::Wind,
            value,
            limit: wind_limit,
        })
    }
}

fn breach_assessment(level: FlagLevel, breach: Breach, wind_unit: &str) -> SafetyAssessment {
    let reason = match breach.metric {
        TriggeringMetric::Wind => format!(
            "Wind {:.1} {} exceeds {} threshold {:.1} {}",
            breach.value,
            wind_unit,
            level.label().to_lowercase(),
            breach.limit,
            wind_unit
        ),
        _ => format!(
            "Flow {:.1} m³/s exceeds {} threshold {:.1} m³/s",
            breach.value,
            level.label().to_lowercase(),
            breach.limit
        ),
    };

    SafetyAssessment {
        level,
        reason,
        triggering_metric: breach.metric,
    }
}

fn green_reason(flow: Option<f64>, wind: Option<f64>, wind_unit: &str) -> String {
    match (flow, wind) {
        (Some(f), Some(w)) => format!(
            "Flow {:.1} m³/s and wind {:.1} {} within limits",
            f, w, wind_unit
        ),
        (Some(f), None) => format!("Flow {:.1} m³/s within limits; no wind data", f),
        (None, Some(w)) => format!("Wind {:.1} {} within limits; river gauge offline", w, wind_unit),
        (None, None) => "Within limits".to_string(),
    }
}
