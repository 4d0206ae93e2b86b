//! Pipeline Definition
//!
//! The ordered stage list is data, built once at Coordinator init, rather
//! than a hardcoded sequence of match arms — each entry names a stage id,
//! its fatality flag, and the progress milestone it reaches on success, per
//! the table in SPEC_FULL.md §4.5.

use ctforge_types::WorkflowStatus;

/// Testing is advisory by default, but `strict_test` flips it to fatal for
/// this one workflow (§4.4.4: "failures are advisory unless a strict-test
/// flag is set"). The rest of the pipeline is fixed regardless of feature
/// toggles.
pub fn pipeline_for(strict_test: bool) -> Vec<PipelineEntry> {
    let mut pipeline = default_pipeline();
    if let Some(testing) = pipeline.iter_mut().find(|e| e.stage_name == "testing") {
        testing.fatal = strict_test;
    }
    pipeline
}

#[derive(Debug, Clone)]
pub struct PipelineEntry {
    pub stage_name: &'static str,
    pub fatal: bool,
    pub progress_milestone: u8,
    pub status_on_start: WorkflowStatus,
}

/// The fixed generate -> compile -> audit -> test -> deploy pipeline.
/// Stages and their order are not configurable at runtime (§1 Non-goals:
/// "the engine is not a general workflow platform").
pub fn default_pipeline() -> Vec<PipelineEntry> {
    vec![
        PipelineEntry {
            stage_name: "generation",
            fatal: true,
            progress_milestone: 20,
            status_on_start: WorkflowStatus::Generating,
        },
        PipelineEntry {
            stage_name: "compilation",
            fatal: true,
            progress_milestone: 40,
            status_on_start: WorkflowStatus::Compiling,
        },
        PipelineEntry {
            stage_name: "audit",
            fatal: false,
            progress_milestone: 60,
            status_on_start: WorkflowStatus::Auditing,
        },
        PipelineEntry {
            stage_name: "testing",
            fatal: false,
            progress_milestone: 80,
            status_on_start: WorkflowStatus::Testing,
        },
        PipelineEntry {
            stage_name: "deployment",
            fatal: true,
            progress_milestone: 100,
            status_on_start: WorkflowStatus::Deploying,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_milestones_are_strictly_increasing() {
        let pipeline = default_pipeline();
        let mut last = 0;
        for entry in &pipeline {
            assert!(entry.progress_milestone > last);
            last = entry.progress_milestone;
        }
    }

    #[test]
    fn audit_and_testing_are_non_fatal_by_default() {
        let pipeline = default_pipeline();
        let by_name = |name: &str| pipeline.iter().find(|e| e.stage_name == name).unwrap();
        assert!(!by_name("audit").fatal);
        assert!(!by_name("testing").fatal);
        assert!(by_name("generation").fatal);
        assert!(by_name("compilation").fatal);
        assert!(by_name("deployment").fatal);
    }

    #[test]
    fn strict_test_makes_testing_fatal() {
        let lenient = pipeline_for(false);
        let strict = pipeline_for(true);
        let find = |p: &[PipelineEntry]| p.iter().find(|e| e.stage_name == "testing").unwrap().fatal;
        assert!(!find(&lenient));
        assert!(find(&strict));
    }
}
