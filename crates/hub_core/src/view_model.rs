use crate::poller::PollerState;
use crate::store::SaveStatus;
use crate::wizard::Wizard;
use crate::{AppState, DocumentKind, JobId, JobKind, JobProgress, Notice, StepIndex};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HubViewModel {
    pub draft_id: Option<String>,
    pub loading: bool,
    pub document_kind: Option<DocumentKind>,
    pub current_step: StepIndex,
    pub total_steps: StepIndex,
    pub step_title: Option<String>,
    /// Why "next" is refused, if it is.
    pub blocker: Option<String>,
    pub save_status: Option<SaveStatus>,
    pub fields: Vec<FieldRowView>,
    pub jobs: Vec<JobRowView>,
    pub results: Vec<ResultRowView>,
    pub notices: Vec<Notice>,
    pub dirty: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRowView {
    pub name: String,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRowView {
    pub kind: JobKind,
    pub state: PollerState,
    pub submitting: bool,
    pub job_id: Option<JobId>,
    pub progress: Option<JobProgress>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultRowView {
    pub step: StepIndex,
    pub kind: JobKind,
    pub stale: bool,
}

impl HubViewModel {
    pub(crate) fn build(state: &AppState) -> Self {
        let mut view = HubViewModel {
            loading: state.mounting.is_some(),
            notices: state.notices.items().to_vec(),
            dirty: state.dirty,
            ..HubViewModel::default()
        };
        let Some(session) = state.session.as_ref() else {
            view.draft_id = state
                .mounting
                .as_ref()
                .map(|request| request.draft_id.clone());
            return view;
        };

        let draft = session.store.draft();
        let wizard = Wizard::for_draft(draft);
        view.draft_id = Some(draft.id.clone());
        view.document_kind = Some(draft.kind);
        view.current_step = draft.current_step;
        view.total_steps = wizard.total_steps();
        view.step_title = wizard
            .spec(draft.current_step)
            .map(|spec| spec.title.to_string());
        view.blocker = wizard.check_forward(draft).err().map(|block| block.to_string());
        view.save_status = Some(session.save_status());
        view.fields = draft
            .step_values(draft.current_step)
            .into_iter()
            .map(|(name, value)| FieldRowView {
                name,
                summary: summarize(&value),
            })
            .collect();
        view.jobs = session
            .jobs
            .iter()
            .map(|(kind, slot)| JobRowView {
                kind: *kind,
                state: slot.poller().state(),
                submitting: slot.is_submitting(),
                job_id: slot.poller().handle().map(|handle| handle.job_id.clone()),
                progress: slot.poller().progress().cloned(),
            })
            .collect();
        view.results = draft
            .results
            .iter()
            .map(|(step, result)| ResultRowView {
                step: *step,
                kind: result.kind,
                stale: result.stale,
            })
            .collect();
        view
    }
}

fn summarize(value: &crate::FieldValue) -> String {
    match value {
        crate::FieldValue::Text { value } => {
            let mut text: String = value.chars().take(60).collect();
            if value.chars().count() > 60 {
                text.push('…');
            }
            text
        }
        crate::FieldValue::Files { files } => files
            .iter()
            .map(|file| file.name.as_str())
            .collect::<Vec<_>>()
            .join(", "),
    }
}
