//! Quality profiles
//!
//! Weights, thresholds and density bands the assessor scores against.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("PROFILE/PARSE: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("PROFILE/INVALID: {0}")]
    Invalid(String),
}

/// Relative weight of each scoring dimension
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DimensionWeights {
    pub technical: f32,
    pub coherence: f32,
    pub creativity: f32,
    pub intent: f32,
}

impl DimensionWeights {
    pub fn total(&self) -> f32 {
        self.technical + self.coherence + self.creativity + self.intent
    }
}

impl Default for DimensionWeights {
    fn default() -> Self {
        Self {
            technical: 0.20,
            coherence: 0.25,
            creativity: 0.25,
            intent: 0.30,
        }
    }
}

/// Quality profile defining weights and thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityProfile {
    /// Profile name (e.g., "standard@1.0")
    pub name: String,

    pub weights: DimensionWeights,

    /// Overall score below which refinement is requested
    pub refine_below: f32,

    // === Density band ===
    /// Average notes per track below this is sparse
    pub min_notes_per_track: f32,
    /// Average notes per track above this is cluttered
    pub max_notes_per_track: f32,
    /// Semitones the whole arrangement should span at least
    pub min_pitch_span: u8,

    /// Allowed relative deviation between requested and produced bars
    pub bar_tolerance: f32,

    /// Reports kept per request
    pub history_capacity: usize,

    /// Medium issues that make it into the recommendations
    pub max_medium_recommendations: usize,
}

impl Default for QualityProfile {
    fn default() -> Self {
        Self {
            name: "standard@1.0".to_string(),
            weights: DimensionWeights::default(),
            refine_below: 0.65,
            min_notes_per_track: 3.0,
            max_notes_per_track: 200.0,
            min_pitch_span: 5,
            bar_tolerance: 0.2,
            history_capacity: 8,
            max_medium_recommendations: 2,
        }
    }
}

impl QualityProfile {
    /// Stricter profile that refines anything short of good
    pub fn strict() -> Self {
        Self {
            name: "strict@1.0".to_string(),
            refine_below: 0.8,
            bar_tolerance: 0.1,
            ..Self::default()
        }
    }

    /// Load profile from YAML. Missing keys take the standard values.
    pub fn from_yaml(yaml: &str) -> Result<Self, ProfileError> {
        let profile: Self = serde_yaml::from_str(yaml)?;
        profile.validate()?;
        Ok(profile)
    }

    pub fn validate(&self) -> Result<(), ProfileError> {
        let weights = [
            self.weights.technical,
            self.weights.coherence,
            self.weights.creativity,
            self.weights.intent,
        ];
        if weights.iter().any(|w| !(0.0..=1.0).contains(w)) {
            return Err(ProfileError::Invalid("weights must be within [0,1]".to_string()));
        }
        if (self.weights.total() - 1.0).abs() > 0.01 {
            return Err(ProfileError::Invalid(format!(
                "weights sum to {:.2}, expected 1.0",
                self.weights.total()
            )));
        }
        if !(0.0..=1.0).contains(&self.refine_below) {
            return Err(ProfileError::Invalid("refine_below must be within [0,1]".to_string()));
        }
        if self.min_notes_per_track > self.max_notes_per_track {
            return Err(ProfileError::Invalid("density band is inverted".to_string()));
        }
        if self.history_capacity == 0 {
            return Err(ProfileError::Invalid("history_capacity must be at least 1".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_profile() {
        let profile = QualityProfile::default();
        assert_eq!(profile.name, "standard@1.0");
        assert!((profile.weights.total() - 1.0).abs() < 1e-6);
        assert_eq!(profile.refine_below, 0.65);
        assert_eq!(profile.history_capacity, 8);
        assert!(profile.validate().is_ok());
    }

    #[test]
    fn test_strict_profile() {
        let profile = QualityProfile::strict();
        assert!(profile.refine_below > QualityProfile::default().refine_below);
        assert!(profile.validate().is_ok());
    }

    #[test]
    fn test_from_yaml_partial() {
        let yaml = r#"
name: "custom@1.0"
refine_below: 0.7
weights:
  technical: 0.25
  coherence: 0.25
  creativity: 0.25
  intent: 0.25
"#;
        let profile = QualityProfile::from_yaml(yaml).unwrap();
        assert_eq!(profile.name, "custom@1.0");
        assert_eq!(profile.refine_below, 0.7);
        assert_eq!(profile.max_notes_per_track, 200.0);
    }

    #[test]
    fn test_from_yaml_rejects_bad_weights() {
        let yaml = "weights: {technical: 0.5, coherence: 0.5, creativity: 0.5, intent: 0.5}\n";
        assert!(matches!(
            QualityProfile::from_yaml(yaml),
            Err(ProfileError::Invalid(_))
        ));
    }
}
