use std::fmt;

use crate::template::{steps_for, StepSpec};
use crate::{Draft, JobKind, StepIndex};

/// Why forward navigation is refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavBlock {
    MissingFields(Vec<String>),
    JobRequired(JobKind),
    JobStale(JobKind),
    LastStep,
}

impl fmt::Display for NavBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NavBlock::MissingFields(fields) => {
                write!(f, "missing required fields: {}", fields.join(", "))
            }
            NavBlock::JobRequired(kind) => write!(f, "{kind} must complete before continuing"),
            NavBlock::JobStale(kind) => {
                write!(f, "{kind} result is out of date; run it again")
            }
            NavBlock::LastStep => write!(f, "already at the last step"),
        }
    }
}

/// Ordered steps of one document kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Wizard {
    steps: &'static [StepSpec],
}

impl Wizard {
    pub fn for_draft(draft: &Draft) -> Self {
        Self {
            steps: steps_for(draft.kind),
        }
    }

    pub fn total_steps(&self) -> StepIndex {
        self.steps.len() as StepIndex
    }

    pub fn spec(&self, step: StepIndex) -> Option<&'static StepSpec> {
        self.steps.iter().find(|spec| spec.index == step)
    }

    pub fn contains(&self, step: StepIndex) -> bool {
        (1..=self.total_steps()).contains(&step)
    }

    /// Checks the forward gate for the draft's current step.
    pub fn check_forward(&self, draft: &Draft) -> Result<StepIndex, NavBlock> {
        let step = draft.current_step;
        if step >= self.total_steps() {
            return Err(NavBlock::LastStep);
        }
        let Some(spec) = self.spec(step) else {
            return Err(NavBlock::LastStep);
        };
        let missing = draft.missing_fields(step, spec.required);
        if !missing.is_empty() {
            return Err(NavBlock::MissingFields(missing));
        }
        if let Some(kind) = spec.job {
            if draft.fresh_result(step).is_none() {
                return Err(if draft.results.contains_key(&step) {
                    NavBlock::JobStale(kind)
                } else {
                    NavBlock::JobRequired(kind)
                });
            }
        }
        Ok(step + 1)
    }

    /// Backward is always allowed above the first step.
    pub fn back_target(&self, draft: &Draft) -> Option<StepIndex> {
        (draft.current_step > 1).then(|| draft.current_step - 1)
    }
}
