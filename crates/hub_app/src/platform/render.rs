use std::fmt::Write;

use hub_core::{HubViewModel, JobRowView, NoticeAction, PollerState, SaveStatus, Severity};

/// Plain-text rendering of the editor, one block per frame.
pub fn render(view: &HubViewModel) -> String {
    let mut out = String::new();
    let Some(draft_id) = view.draft_id.as_deref() else {
        out.push_str("(no draft open)\n");
        render_notices(&mut out, view);
        return out;
    };
    if view.loading {
        let _ = writeln!(out, "loading draft {draft_id}...");
        render_notices(&mut out, view);
        return out;
    }

    let kind = view
        .document_kind
        .map(|kind| format!("{kind:?}").to_lowercase())
        .unwrap_or_default();
    let _ = writeln!(
        out,
        "== {kind} {draft_id} | step {}/{}: {} | {}",
        view.current_step,
        view.total_steps,
        view.step_title.as_deref().unwrap_or("?"),
        save_label(view.save_status.as_ref()),
    );
    for field in &view.fields {
        let _ = writeln!(out, "  {:<24} {}", field.name, field.summary);
    }
    if let Some(blocker) = &view.blocker {
        let _ = writeln!(out, "  next blocked: {blocker}");
    }
    for job in &view.jobs {
        let _ = writeln!(out, "  job {}", job_label(job));
    }
    for result in &view.results {
        let _ = writeln!(
            out,
            "  result step {} ({}){}",
            result.step,
            result.kind,
            if result.stale { " stale" } else { "" }
        );
    }
    render_notices(&mut out, view);
    out
}

fn render_notices(out: &mut String, view: &HubViewModel) {
    for notice in &view.notices {
        let tag = match notice.severity {
            Severity::Info => "info",
            Severity::Warning => "warn",
            Severity::Error => "error",
        };
        let actions: Vec<String> = notice.actions.iter().map(action_hint).collect();
        let _ = write!(out, "  [{}] {tag}: {}", notice.id, notice.message);
        if !actions.is_empty() {
            let _ = write!(out, " ({})", actions.join(" | "));
        }
        out.push('\n');
    }
}

fn save_label(status: Option<&SaveStatus>) -> String {
    match status {
        Some(SaveStatus::Saved) | None => "saved".to_string(),
        Some(SaveStatus::Pending) => "unsaved changes".to_string(),
        Some(SaveStatus::Saving) => "saving...".to_string(),
        Some(SaveStatus::Failed(reason)) => format!("save failed: {reason}"),
    }
}

fn job_label(job: &JobRowView) -> String {
    let state = if job.submitting {
        "submitting".to_string()
    } else {
        match job.state {
            PollerState::Idle => "idle".to_string(),
            PollerState::Polling => match &job.progress {
                Some(progress) if progress.total > 0 => format!(
                    "running {}/{} {}",
                    progress.step, progress.total, progress.message
                ),
                _ => "running".to_string(),
            },
            PollerState::Completed => "completed".to_string(),
            PollerState::Failed => "failed".to_string(),
            PollerState::TimedOut => "timed out".to_string(),
            PollerState::Cancelled => "cancelled".to_string(),
        }
    };
    match &job.job_id {
        Some(id) => format!("{} [{id}]: {}", job.kind, state.trim_end()),
        None => format!("{}: {}", job.kind, state.trim_end()),
    }
}

fn action_hint(action: &NoticeAction) -> String {
    match action {
        NoticeAction::RetryJob(kind) => format!("retry {kind}"),
        NoticeAction::DiscardJob(kind) => format!("discard {kind}"),
        NoticeAction::RetryMount(_) => "reload".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hub_core::{DocumentKind, FieldRowView, JobId, JobKind, JobProgress, Notice, ResultRowView};

    fn editor_view() -> HubViewModel {
        HubViewModel {
            draft_id: Some("D1".to_string()),
            document_kind: Some(DocumentKind::Proposal),
            current_step: 2,
            total_steps: 4,
            step_title: Some("Concept".to_string()),
            blocker: Some("missing required fields: concept_text".to_string()),
            save_status: Some(SaveStatus::Pending),
            fields: vec![FieldRowView {
                name: "concept_text".to_string(),
                summary: "Drought resilience".to_string(),
            }],
            jobs: vec![JobRowView {
                kind: JobKind::Analysis,
                state: PollerState::Polling,
                submitting: false,
                job_id: Some(JobId::new("J7")),
                progress: Some(JobProgress {
                    step: 2,
                    total: 5,
                    message: "scoring".to_string(),
                }),
            }],
            results: vec![ResultRowView {
                step: 1,
                kind: JobKind::Analysis,
                stale: true,
            }],
            notices: vec![Notice {
                id: 3,
                severity: Severity::Error,
                message: "analysis job failed".to_string(),
                actions: vec![
                    NoticeAction::RetryJob(JobKind::Analysis),
                    NoticeAction::DiscardJob(JobKind::Analysis),
                ],
            }],
            ..HubViewModel::default()
        }
    }

    #[test]
    fn editor_frame_lists_every_section() {
        let text = render(&editor_view());
        assert!(text.starts_with("== proposal D1 | step 2/4: Concept | unsaved changes\n"));
        assert!(text.contains("next blocked: missing required fields: concept_text"));
        assert!(text.contains("job analysis [J7]: running 2/5 scoring"));
        assert!(text.contains("result step 1 (analysis) stale"));
        assert!(text.contains("[3] error: analysis job failed (retry analysis | discard analysis)"));
    }

    #[test]
    fn loading_frame_is_short() {
        let view = HubViewModel {
            draft_id: Some("D1".to_string()),
            loading: true,
            ..HubViewModel::default()
        };
        assert_eq!(render(&view), "loading draft D1...\n");
    }
}
