//! Wizard step definitions per document kind.

use crate::{DocumentKind, JobKind, StepIndex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepSpec {
    pub index: StepIndex,
    pub title: &'static str,
    pub required: &'static [&'static str],
    /// AI job whose completed result gates leaving this step.
    pub job: Option<JobKind>,
}

const PROPOSAL_STEPS: &[StepSpec] = &[
    StepSpec {
        index: 1,
        title: "Information consolidation",
        required: &["rfp_document"],
        job: Some(JobKind::Analysis),
    },
    StepSpec {
        index: 2,
        title: "Concept review",
        required: &["concept_text"],
        job: Some(JobKind::Analysis),
    },
    StepSpec {
        index: 3,
        title: "Structure and workplan",
        required: &["sections"],
        job: Some(JobKind::Generation),
    },
    StepSpec {
        index: 4,
        title: "Review and refinement",
        required: &[],
        job: None,
    },
];

const NEWSLETTER_STEPS: &[StepSpec] = &[
    StepSpec {
        index: 1,
        title: "Configuration",
        required: &["title", "audience"],
        job: None,
    },
    StepSpec {
        index: 2,
        title: "Content planning",
        required: &["topics"],
        job: Some(JobKind::Analysis),
    },
    StepSpec {
        index: 3,
        title: "Outline",
        required: &[],
        job: Some(JobKind::Generation),
    },
    StepSpec {
        index: 4,
        title: "Drafting",
        required: &[],
        job: Some(JobKind::Generation),
    },
    StepSpec {
        index: 5,
        title: "Export",
        required: &[],
        job: None,
    },
];

pub fn steps_for(kind: DocumentKind) -> &'static [StepSpec] {
    match kind {
        DocumentKind::Proposal => PROPOSAL_STEPS,
        DocumentKind::Newsletter => NEWSLETTER_STEPS,
    }
}

pub fn step_spec(kind: DocumentKind, step: StepIndex) -> Option<&'static StepSpec> {
    steps_for(kind).iter().find(|spec| spec.index == step)
}
