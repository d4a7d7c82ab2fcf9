//! Quality reports and the bounded per-request report history.
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::data_model::Vocabulary;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Vocabulary for Severity {
    const ALL: &'static [Self] = &[Self::Low, Self::Medium, Self::High, Self::Critical];

    fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCategory {
    Technical,
    Density,
    Harmony,
    Arrangement,
    Repetition,
    Duration,
    Genre,
    Instrumentation,
}

impl Vocabulary for IssueCategory {
    const ALL: &'static [Self] = &[
        Self::Technical,
        Self::Density,
        Self::Harmony,
        Self::Arrangement,
        Self::Repetition,
        Self::Duration,
        Self::Genre,
        Self::Instrumentation,
    ];

    fn as_str(&self) -> &'static str {
        match self {
            Self::Technical => "technical",
            Self::Density => "density",
            Self::Harmony => "harmony",
            Self::Arrangement => "arrangement",
            Self::Repetition => "repetition",
            Self::Duration => "duration",
            Self::Genre => "genre",
            Self::Instrumentation => "instrumentation",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub category: IssueCategory,
    pub severity: Severity,
    pub description: String,
    pub suggestion: String,
    /// Track the issue is about; None means the whole composition
    pub track_index: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DimensionScores {
    pub technical: f32,
    pub coherence: f32,
    pub creativity: f32,
    pub intent: f32,
}

/// Result of one assessor call. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    /// 0.0..=1.0
    pub score: f32,
    pub issues: Vec<Issue>,
    pub needs_refinement: bool,
    pub recommendations: Vec<String>,
    pub dimensions: DimensionScores,
    /// "blake3:<hex>" over the pitch material that was scored
    pub fingerprint: String,
    /// Loop iteration the report was produced in
    pub iteration: u32,
}

impl QualityReport {
    pub fn worst_severity(&self) -> Option<Severity> {
        self.issues.iter().map(|i| i.severity).max()
    }

    pub fn issues_at_least(&self, severity: Severity) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(move |i| i.severity >= severity)
    }

    /// Order-independent identity of the issue set, used to spot a
    /// refinement pass that failed exactly like the previous one.
    pub fn issue_signature(&self) -> Vec<(IssueCategory, Severity, Option<usize>)> {
        let mut signature: Vec<_> = self
            .issues
            .iter()
            .map(|i| (i.category, i.severity, i.track_index))
            .collect();
        signature.sort();
        signature
    }
}

/// Insertion-ordered, capacity-bounded list of reports for one request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityHistory {
    capacity: usize,
    reports: VecDeque<QualityReport>,
}

impl QualityHistory {
    pub const DEFAULT_CAPACITY: usize = 8;

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            reports: VecDeque::new(),
        }
    }

    /// Appends a report, evicting the oldest once full
    pub fn push(&mut self, report: QualityReport) {
        if self.reports.len() == self.capacity {
            self.reports.pop_front();
        }
        self.reports.push_back(report);
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    pub fn latest(&self) -> Option<&QualityReport> {
        self.reports.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &QualityReport> {
        self.reports.iter()
    }

    /// The last `n` reports, oldest first
    pub fn recent(&self, n: usize) -> Vec<&QualityReport> {
        let skip = self.reports.len().saturating_sub(n);
        self.reports.iter().skip(skip).collect()
    }

    pub fn contains_fingerprint(&self, fingerprint: &str) -> bool {
        self.reports.iter().any(|r| r.fingerprint == fingerprint)
    }

    /// True when the two most recent reports carry the same non-empty issue
    /// set.
    pub fn repeated_failure(&self) -> bool {
        let n = self.reports.len();
        if n < 2 {
            return false;
        }
        let last = &self.reports[n - 1];
        let previous = &self.reports[n - 2];
        !last.issues.is_empty() && last.issue_signature() == previous.issue_signature()
    }
}

impl Default for QualityHistory {
    fn default() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(fingerprint: &str, issues: Vec<Issue>) -> QualityReport {
        QualityReport {
            score: 0.5,
            issues,
            needs_refinement: true,
            recommendations: vec![],
            dimensions: DimensionScores::default(),
            fingerprint: fingerprint.to_string(),
            iteration: 0,
        }
    }

    fn issue(category: IssueCategory, severity: Severity) -> Issue {
        Issue {
            category,
            severity,
            description: "d".to_string(),
            suggestion: "s".to_string(),
            track_index: Some(0),
        }
    }

    #[test]
    fn test_history_is_bounded_and_ordered() {
        let mut history = QualityHistory::with_capacity(2);
        history.push(report("a", vec![]));
        history.push(report("b", vec![]));
        history.push(report("c", vec![]));
        assert_eq!(history.len(), 2);
        let order: Vec<&str> = history.iter().map(|r| r.fingerprint.as_str()).collect();
        assert_eq!(order, vec!["b", "c"]);
        assert!(!history.contains_fingerprint("a"));
    }

    #[test]
    fn test_repeated_failure_detection() {
        let mut history = QualityHistory::default();
        history.push(report("a", vec![issue(IssueCategory::Density, Severity::High)]));
        assert!(!history.repeated_failure());
        history.push(report("b", vec![issue(IssueCategory::Density, Severity::High)]));
        assert!(history.repeated_failure());
        history.push(report("c", vec![issue(IssueCategory::Harmony, Severity::High)]));
        assert!(!history.repeated_failure());
    }

    #[test]
    fn test_worst_severity() {
        let r = report(
            "x",
            vec![
                issue(IssueCategory::Density, Severity::Medium),
                issue(IssueCategory::Technical, Severity::Critical),
            ],
        );
        assert_eq!(r.worst_severity(), Some(Severity::Critical));
        assert_eq!(r.issues_at_least(Severity::High).count(), 1);
    }
}
