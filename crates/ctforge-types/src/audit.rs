//! Audit Record
//!
//! Created by the Audit stage; aggregates per-tool findings into a risk
//! score and an advisory status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Weight used to aggregate findings into a risk score (§4.4.3).
    pub fn weight(self) -> u32 {
        match self {
            Severity::Critical => 25,
            Severity::High => 15,
            Severity::Medium => 5,
            Severity::Low => 1,
            Severity::Info => 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub tool: String,
    pub severity: Severity,
    pub title: String,
    pub description: String,
    pub location: Option<String>,
}

impl Finding {
    /// Dedup key per §4.4.3: `(title, severity, location)`.
    fn dedup_key(&self) -> (String, Severity, Option<String>) {
        (self.title.clone(), self.severity, self.location.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditStatus {
    Passed,
    Warning,
    Failed,
}

impl AuditStatus {
    pub fn from_score(score: u32) -> Self {
        if score < 30 {
            AuditStatus::Passed
        } else if score < 70 {
            AuditStatus::Warning
        } else {
            AuditStatus::Failed
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub critical: u32,
    pub high: u32,
    pub medium: u32,
    pub low: u32,
    pub info: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: Uuid,
    pub contract_id: Uuid,
    pub findings: Vec<Finding>,
    pub counts: SeverityCounts,
    pub risk_score: u32,
    pub status: AuditStatus,
    pub created_at: DateTime<Utc>,
}

impl AuditRecord {
    /// Deduplicate findings by `(title, severity, location)` and compute the
    /// aggregated risk score and status, per §4.4.3.
    pub fn aggregate(contract_id: Uuid, raw_findings: Vec<Finding>) -> Self {
        let mut seen = std::collections::HashSet::new();
        let mut findings = Vec::new();
        for finding in raw_findings {
            if seen.insert(finding.dedup_key()) {
                findings.push(finding);
            }
        }

        let mut counts = SeverityCounts::default();
        let mut score: u32 = 0;
        for finding in &findings {
            score += finding.severity.weight();
            match finding.severity {
                Severity::Critical => counts.critical += 1,
                Severity::High => counts.high += 1,
                Severity::Medium => counts.medium += 1,
                Severity::Low => counts.low += 1,
                Severity::Info => counts.info += 1,
            }
        }
        let risk_score = score.min(100);

        Self {
            id: Uuid::new_v4(),
            contract_id,
            findings,
            counts,
            risk_score,
            status: AuditStatus::from_score(risk_score),
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finding(title: &str, severity: Severity) -> Finding {
        Finding {
            tool: "static-analyzer".into(),
            severity,
            title: title.into(),
            description: "desc".into(),
            location: Some("L1".into()),
        }
    }

    #[test]
    fn duplicate_findings_are_deduplicated() {
        let record = AuditRecord::aggregate(
            Uuid::new_v4(),
            vec![
                finding("reentrancy", Severity::High),
                finding("reentrancy", Severity::High),
            ],
        );
        assert_eq!(record.findings.len(), 1);
        assert_eq!(record.risk_score, 15);
        assert_eq!(record.status, AuditStatus::Passed);
    }

    #[test]
    fn risk_score_is_capped_at_100() {
        let findings: Vec<_> = (0..10)
            .map(|i| finding(&format!("issue-{i}"), Severity::Critical))
            .collect();
        let record = AuditRecord::aggregate(Uuid::new_v4(), findings);
        assert_eq!(record.risk_score, 100);
        assert_eq!(record.status, AuditStatus::Failed);
    }

    #[test]
    fn status_boundaries_match_spec() {
        assert_eq!(AuditStatus::from_score(29), AuditStatus::Passed);
        assert_eq!(AuditStatus::from_score(30), AuditStatus::Warning);
        assert_eq!(AuditStatus::from_score(69), AuditStatus::Warning);
        assert_eq!(AuditStatus::from_score(70), AuditStatus::Failed);
    }
}
