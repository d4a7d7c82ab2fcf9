//! Quality assessor
//!
//! Runs the four dimension analyzers, weights their scores and decides
//! whether the material needs another refinement pass.

use midigent_core::{
    DimensionScores, Issue, ParameterSet, QualityHistory, QualityReport, Severity, Track,
    TrackPlan, Vocabulary,
};
use tracing::{debug, info};

use crate::checks::{self, Material};
use crate::profile::QualityProfile;

/// One assessor call
#[derive(Debug, Clone, Copy)]
pub struct Assessment<'a> {
    pub parameters: &'a ParameterSet,
    pub plan: &'a TrackPlan,
    pub tracks: &'a [Track],
    /// Reports from earlier passes of the same request
    pub history: &'a QualityHistory,
    pub iteration: u32,
    pub rhythmic_genre: bool,
}

#[derive(Debug, Clone, Default)]
pub struct QualityAssessor {
    profile: QualityProfile,
}

impl QualityAssessor {
    pub fn new(profile: QualityProfile) -> Self {
        Self { profile }
    }

    pub fn profile(&self) -> &QualityProfile {
        &self.profile
    }

    /// Empty history sized for this profile
    pub fn history(&self) -> QualityHistory {
        QualityHistory::with_capacity(self.profile.history_capacity)
    }

    pub fn assess(&self, input: &Assessment) -> QualityReport {
        let material = Material {
            parameters: input.parameters,
            plan: input.plan,
            tracks: input.tracks,
            rhythmic_genre: input.rhythmic_genre,
        };
        let fingerprint = fingerprint(input.tracks);

        let technical = checks::technical(&material, &self.profile);
        let coherence = checks::coherence(&material);
        let creativity = checks::creativity(&material, &fingerprint, input.history);
        let intent = checks::intent(&material, &self.profile);

        let weights = &self.profile.weights;
        let score = (technical.score * weights.technical
            + coherence.score * weights.coherence
            + creativity.score * weights.creativity
            + intent.score * weights.intent)
            .clamp(0.0, 1.0);

        let dimensions = DimensionScores {
            technical: technical.score,
            coherence: coherence.score,
            creativity: creativity.score,
            intent: intent.score,
        };

        let mut issues: Vec<Issue> = [technical, coherence, creativity, intent]
            .into_iter()
            .flat_map(|d| d.issues)
            .collect();
        // Worst first, stable within a severity
        issues.sort_by(|a, b| b.severity.cmp(&a.severity));

        let worst = issues.first().map(|i| i.severity);
        let needs_refinement =
            worst.map_or(false, |s| s >= Severity::High) || score < self.profile.refine_below;

        let recommendations = self.recommendations(&issues);

        for issue in &issues {
            debug!(
                category = ?issue.category,
                severity = ?issue.severity,
                track = ?issue.track_index,
                "{}",
                issue.description
            );
        }
        info!(
            score,
            issues = issues.len(),
            needs_refinement,
            iteration = input.iteration,
            "quality assessed"
        );

        QualityReport {
            score,
            issues,
            needs_refinement,
            recommendations,
            dimensions,
            fingerprint,
            iteration: input.iteration,
        }
    }

    /// Critical and high issues in full, then a capped number of medium ones
    fn recommendations(&self, sorted: &[Issue]) -> Vec<String> {
        let mut recommendations = Vec::new();
        let mut medium = 0;
        for issue in sorted {
            let tag = match issue.severity {
                Severity::Critical => "[CRITICAL]",
                Severity::High => "[HIGH]",
                Severity::Medium if medium < self.profile.max_medium_recommendations => {
                    medium += 1;
                    "[MEDIUM]"
                }
                _ => continue,
            };
            recommendations.push(format!("{} {}: {}", tag, issue.description, issue.suggestion));
        }
        recommendations
    }
}

/// "blake3:<hex>" over every track's kind, pitches and onsets
pub fn fingerprint(tracks: &[Track]) -> String {
    let mut hasher = blake3::Hasher::new();
    for track in tracks {
        hasher.update(track.kind.as_str().as_bytes());
        hasher.update(&[0xff]);
        for note in &track.notes {
            hasher.update(&[note.pitch]);
            // Onsets at tick resolution
            hasher.update(&((note.start * 480.0).round() as i64).to_le_bytes());
        }
        hasher.update(&[0xfe]);
    }
    format!("blake3:{}", hasher.finalize().to_hex())
}

#[cfg(test)]
mod tests {
    use super::*;
    use midigent_core::{InstrumentRequest, InstrumentRole, Note, TrackKind, TrackSpec};

    fn track(name: &str, kind: TrackKind, base: u8, beats: usize) -> Track {
        Track {
            name: name.to_string(),
            kind,
            instrument: name.to_string(),
            program: 0,
            channel: 0,
            notes: (0..beats)
                .map(|i| Note::new((base as usize + (i * 5) % 12) as i32, i as f64, 1.0, 80, 0))
                .collect(),
        }
    }

    fn parameters() -> ParameterSet {
        let mut params = ParameterSet::default();
        params.duration.bars = 4;
        params.instruments = vec![
            InstrumentRequest {
                name: "piano".to_string(),
                role: InstrumentRole::Melody,
                priority: 8,
            },
            InstrumentRequest {
                name: "electric_bass".to_string(),
                role: InstrumentRole::Bass,
                priority: 7,
            },
            InstrumentRequest {
                name: "drums".to_string(),
                role: InstrumentRole::Rhythm,
                priority: 6,
            },
        ];
        params
    }

    fn plan(params: &ParameterSet) -> TrackPlan {
        TrackPlan {
            genre: params.genre.primary.clone(),
            tracks: vec![TrackSpec {
                kind: TrackKind::Lead,
                instrument: "piano".to_string(),
                role: InstrumentRole::Melody,
                priority: 1,
                channel: 0,
            }],
        }
    }

    fn good_tracks() -> Vec<Track> {
        vec![
            track("piano", TrackKind::Lead, 60, 16),
            track("electric_bass", TrackKind::Bass, 36, 16),
            track("drums", TrackKind::Drums, 36, 16),
        ]
    }

    #[test]
    fn test_good_material_passes() {
        let params = parameters();
        let plan = plan(&params);
        let tracks = good_tracks();
        let history = QualityHistory::default();
        let report = QualityAssessor::default().assess(&Assessment {
            parameters: &params,
            plan: &plan,
            tracks: &tracks,
            history: &history,
            iteration: 0,
            rhythmic_genre: true,
        });

        assert!(report.score >= 0.65, "score {}", report.score);
        assert!(!report.needs_refinement);
        assert!(report.fingerprint.starts_with("blake3:"));
    }

    #[test]
    fn test_no_tracks_needs_refinement() {
        let params = parameters();
        let plan = plan(&params);
        let history = QualityHistory::default();
        let report = QualityAssessor::default().assess(&Assessment {
            parameters: &params,
            plan: &plan,
            tracks: &[],
            history: &history,
            iteration: 0,
            rhythmic_genre: true,
        });

        assert!(report.needs_refinement);
        assert_eq!(report.dimensions.technical, 0.0);
        assert!(report.recommendations[0].starts_with("[CRITICAL]"));
    }

    #[test]
    fn test_repeated_fingerprint_is_flagged() {
        let params = parameters();
        let plan = plan(&params);
        let tracks = good_tracks();
        let assessor = QualityAssessor::default();
        let mut history = assessor.history();

        let first = assessor.assess(&Assessment {
            parameters: &params,
            plan: &plan,
            tracks: &tracks,
            history: &history,
            iteration: 0,
            rhythmic_genre: true,
        });
        history.push(first.clone());
        let second = assessor.assess(&Assessment {
            parameters: &params,
            plan: &plan,
            tracks: &tracks,
            history: &history,
            iteration: 1,
            rhythmic_genre: true,
        });

        assert_eq!(first.fingerprint, second.fingerprint);
        assert!(second.needs_refinement);
        assert!(second
            .issues
            .iter()
            .any(|i| i.category == midigent_core::IssueCategory::Repetition));
    }

    #[test]
    fn test_medium_recommendations_are_capped() {
        let mut params = parameters();
        for name in ["flute", "oboe", "harp", "celesta"] {
            params.instruments.push(InstrumentRequest {
                name: name.to_string(),
                role: InstrumentRole::Harmony,
                priority: 5,
            });
        }
        let plan = plan(&params);
        let tracks = good_tracks();
        let history = QualityHistory::default();
        let report = QualityAssessor::default().assess(&Assessment {
            parameters: &params,
            plan: &plan,
            tracks: &tracks,
            history: &history,
            iteration: 0,
            rhythmic_genre: true,
        });

        let medium = report
            .recommendations
            .iter()
            .filter(|r| r.starts_with("[MEDIUM]"))
            .count();
        assert_eq!(medium, 2);
        assert!(report.issues.len() >= 4);
    }

    #[test]
    fn test_fingerprint_changes_with_material() {
        let a = good_tracks();
        let mut b = good_tracks();
        b[0].notes[0].pitch += 1;
        assert_ne!(fingerprint(&a), fingerprint(&b));
        assert_eq!(fingerprint(&a), fingerprint(&good_tracks()));
    }
}
