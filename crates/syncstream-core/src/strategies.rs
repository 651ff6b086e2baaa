//! Reference strategies
//!
//! Every strategy keeps a track whose features are unknown: missing
//! telemetry never blocks playback.

use std::fmt::Debug;
use syncstream_api::{StrategyAction, StrategyParameters, Track};
use tracing::{debug, info};

/// A policy that classifies one track as keep or skip
pub trait Strategy: Send + Sync + Debug {
    fn evaluate(&self, track: &Track) -> StrategyAction;
}

/// Read a numeric parameter, trying `keys` in order.
///
/// Numbers and numeric strings are accepted; anything else (including
/// non-finite values) falls through to `default`.
pub fn param_f64(params: &StrategyParameters, keys: &[&str], default: f64) -> f64 {
    keys.iter()
        .filter_map(|key| params.get(*key))
        .find_map(|value| match value {
            serde_json::Value::Number(n) => n.as_f64(),
            serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        })
        .filter(|v| v.is_finite())
        .unwrap_or(default)
}

/// Keeps instrumental, calm tracks suited to deep work
#[derive(Debug, Clone, PartialEq)]
pub struct FocusGuard {
    pub instrumentalness_threshold: f64,
    pub energy_threshold: f64,
}

impl Default for FocusGuard {
    fn default() -> Self {
        Self {
            instrumentalness_threshold: 0.75,
            energy_threshold: 0.5,
        }
    }
}

impl FocusGuard {
    pub fn from_parameters(params: &StrategyParameters) -> Self {
        let defaults = Self::default();
        Self {
            instrumentalness_threshold: param_f64(
                params,
                &["instrumentalness_threshold", "instrumentalness"],
                defaults.instrumentalness_threshold,
            ),
            energy_threshold: param_f64(
                params,
                &["energy_threshold", "energy"],
                defaults.energy_threshold,
            ),
        }
    }
}

impl Strategy for FocusGuard {
    fn evaluate(&self, track: &Track) -> StrategyAction {
        let Some(features) = &track.features else {
            debug!(track_id = %track.id, "FocusGuard: no features, keeping track");
            return StrategyAction::Keep;
        };

        if features.instrumentalness >= self.instrumentalness_threshold
            && features.energy <= self.energy_threshold
        {
            StrategyAction::Keep
        } else {
            info!(
                track_id = %track.id,
                name = %track.name,
                instrumentalness = features.instrumentalness,
                energy = features.energy,
                "FocusGuard: non-focus track detected"
            );
            StrategyAction::Skip
        }
    }
}

/// Keeps tracks at or above an energy floor
#[derive(Debug, Clone, PartialEq)]
pub struct EnergyFloor {
    pub energy_floor: f64,
}

impl Default for EnergyFloor {
    fn default() -> Self {
        Self { energy_floor: 0.7 }
    }
}

impl EnergyFloor {
    pub fn from_parameters(params: &StrategyParameters) -> Self {
        Self {
            energy_floor: param_f64(params, &["energy_floor"], Self::default().energy_floor),
        }
    }
}

impl Strategy for EnergyFloor {
    fn evaluate(&self, track: &Track) -> StrategyAction {
        match &track.features {
            Some(f) if f.energy < self.energy_floor => {
                info!(
                    track_id = %track.id,
                    energy = f.energy,
                    floor = self.energy_floor,
                    "EnergyFloor: energy below floor"
                );
                StrategyAction::Skip
            }
            _ => StrategyAction::Keep,
        }
    }
}

/// Keeps tracks whose valence falls inside a band
#[derive(Debug, Clone, PartialEq)]
pub struct VibeShift {
    pub min_valence: f64,
    pub max_valence: f64,
}

impl Default for VibeShift {
    fn default() -> Self {
        Self {
            min_valence: 0.6,
            max_valence: 1.0,
        }
    }
}

impl VibeShift {
    pub fn from_parameters(params: &StrategyParameters) -> Self {
        let defaults = Self::default();
        Self {
            min_valence: param_f64(params, &["min_valence"], defaults.min_valence),
            max_valence: param_f64(params, &["max_valence"], defaults.max_valence),
        }
    }
}

impl Strategy for VibeShift {
    fn evaluate(&self, track: &Track) -> StrategyAction {
        match &track.features {
            Some(f) if f.valence < self.min_valence || f.valence > self.max_valence => {
                info!(
                    track_id = %track.id,
                    valence = f.valence,
                    min = self.min_valence,
                    max = self.max_valence,
                    "VibeShift: valence outside band"
                );
                StrategyAction::Skip
            }
            _ => StrategyAction::Keep,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use syncstream_api::AudioFeatures;

    fn track_with(features: Option<AudioFeatures>) -> Track {
        Track {
            id: "t1".into(),
            name: "Test Track".into(),
            uri: String::new(),
            duration_ms: 180_000,
            explicit: false,
            popularity: 50,
            artists: vec![],
            album: None,
            features,
        }
    }

    fn features(instrumentalness: f64, energy: f64, valence: f64) -> Option<AudioFeatures> {
        Some(AudioFeatures {
            id: "t1".into(),
            instrumentalness,
            energy,
            valence,
            ..Default::default()
        })
    }

    #[test]
    fn absent_features_always_keep() {
        let track = track_with(None);
        let strategies: Vec<Box<dyn Strategy>> = vec![
            Box::new(FocusGuard::default()),
            Box::new(FocusGuard {
                instrumentalness_threshold: 1.0,
                energy_threshold: 0.0,
            }),
            Box::new(EnergyFloor { energy_floor: 1.0 }),
            Box::new(VibeShift {
                min_valence: 0.99,
                max_valence: 0.01,
            }),
        ];

        for strategy in strategies {
            assert_eq!(strategy.evaluate(&track), StrategyAction::Keep, "{strategy:?}");
        }
    }

    #[test]
    fn focus_guard_thresholds() {
        let focus = FocusGuard::default();
        let cases = [
            ((0.80, 0.40), StrategyAction::Keep),
            ((0.70, 0.40), StrategyAction::Skip),
            ((0.90, 0.60), StrategyAction::Skip),
            ((0.10, 0.90), StrategyAction::Skip),
        ];

        for ((instrumentalness, energy), expected) in cases {
            let track = track_with(features(instrumentalness, energy, 0.5));
            assert_eq!(
                focus.evaluate(&track),
                expected,
                "instrumentalness={instrumentalness} energy={energy}"
            );
        }
    }

    #[test]
    fn focus_guard_boundaries_are_inclusive() {
        let focus = FocusGuard::default();
        let track = track_with(features(0.75, 0.5, 0.5));
        assert_eq!(focus.evaluate(&track), StrategyAction::Keep);
    }

    #[test]
    fn energy_floor() {
        let floor = EnergyFloor { energy_floor: 0.7 };
        assert_eq!(floor.evaluate(&track_with(features(0.0, 0.8, 0.0))), StrategyAction::Keep);
        assert_eq!(floor.evaluate(&track_with(features(0.0, 0.6, 0.0))), StrategyAction::Skip);
    }

    #[test]
    fn vibe_shift_band() {
        let vibe = VibeShift {
            min_valence: 0.7,
            max_valence: 0.9,
        };
        assert_eq!(vibe.evaluate(&track_with(features(0.0, 0.0, 0.8))), StrategyAction::Keep);
        assert_eq!(vibe.evaluate(&track_with(features(0.0, 0.0, 0.4))), StrategyAction::Skip);
        assert_eq!(vibe.evaluate(&track_with(features(0.0, 0.0, 0.95))), StrategyAction::Skip);
    }

    #[test]
    fn parameters_fall_back_to_defaults() {
        let mut params = StrategyParameters::new();
        params.insert("instrumentalness_threshold".into(), json!("0.9"));
        params.insert("energy_threshold".into(), json!([1, 2]));

        let focus = FocusGuard::from_parameters(&params);
        assert_eq!(focus.instrumentalness_threshold, 0.9);
        assert_eq!(focus.energy_threshold, 0.5);
    }

    #[test]
    fn focus_accepts_legacy_keys() {
        let mut params = StrategyParameters::new();
        params.insert("instrumentalness".into(), json!(0.6));
        params.insert("energy".into(), json!(0.3));

        let focus = FocusGuard::from_parameters(&params);
        assert_eq!(focus.instrumentalness_threshold, 0.6);
        assert_eq!(focus.energy_threshold, 0.3);
    }
}
