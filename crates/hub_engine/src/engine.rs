use std::collections::HashMap;
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use chrono::Utc;
use hub_core::{
    DraftPatch, FlushId, HubError, JobId, JobKind, JobRequest, RecoverySnapshot, TimerSlot,
};
use hub_logging::{hub_debug, hub_info, hub_warn};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::cache::RecoveryCache;
use crate::client::{DraftApi, JobApi};
use crate::{EngineError, EngineEvent};

/// IO implementations the engine executes effects against.
#[derive(Clone)]
pub struct Backends {
    pub drafts: Arc<dyn DraftApi>,
    pub jobs: Arc<dyn JobApi>,
    pub cache: RecoveryCache,
}

enum EngineCommand {
    LoadDraft {
        draft_id: String,
    },
    PersistDraft {
        draft_id: String,
        flush_id: FlushId,
        patch: DraftPatch,
    },
    DeleteDraft {
        draft_id: String,
    },
    MirrorRecovery {
        snapshot: RecoverySnapshot,
    },
    ClearRecovery {
        draft_id: String,
    },
    SubmitJob {
        kind: JobKind,
        ticket: u64,
        request: JobRequest,
    },
    QueryJobStatus {
        kind: JobKind,
        ticket: u64,
        job_id: JobId,
    },
    StartTimer {
        slot: TimerSlot,
        token: u64,
        delay: Duration,
    },
    CancelTimer {
        slot: TimerSlot,
    },
}

/// Front of the IO worker: commands in, events out.
pub struct EngineHandle {
    cmd_tx: UnboundedSender<EngineCommand>,
    event_rx: mpsc::Receiver<EngineEvent>,
    shutdown: CancellationToken,
    thread: Option<thread::JoinHandle<()>>,
}

impl EngineHandle {
    /// Starts the worker on a dedicated thread with its own runtime.
    pub fn new(backends: Backends) -> Result<Self, EngineError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .map_err(EngineError::Runtime)?;
        let (cmd_tx, cmd_rx) = unbounded_channel();
        let (event_tx, event_rx) = mpsc::channel();
        let shutdown = CancellationToken::new();
        let worker = Worker::new(backends, event_tx, shutdown.clone());

        let thread = thread::Builder::new()
            .name("hub-engine".to_string())
            .spawn(move || runtime.block_on(worker.run(cmd_rx)))
            .map_err(EngineError::Runtime)?;

        Ok(Self {
            cmd_tx,
            event_rx,
            shutdown,
            thread: Some(thread),
        })
    }

    /// Starts the worker as a task on an existing runtime.
    pub fn spawn_on(runtime: &tokio::runtime::Handle, backends: Backends) -> Self {
        let (cmd_tx, cmd_rx) = unbounded_channel();
        let (event_tx, event_rx) = mpsc::channel();
        let shutdown = CancellationToken::new();
        let worker = Worker::new(backends, event_tx, shutdown.clone());
        runtime.spawn(worker.run(cmd_rx));
        Self {
            cmd_tx,
            event_rx,
            shutdown,
            thread: None,
        }
    }

    pub fn load_draft(&self, draft_id: impl Into<String>) {
        self.send(EngineCommand::LoadDraft {
            draft_id: draft_id.into(),
        });
    }

    pub fn persist_draft(&self, draft_id: impl Into<String>, flush_id: FlushId, patch: DraftPatch) {
        self.send(EngineCommand::PersistDraft {
            draft_id: draft_id.into(),
            flush_id,
            patch,
        });
    }

    pub fn delete_draft(&self, draft_id: impl Into<String>) {
        self.send(EngineCommand::DeleteDraft {
            draft_id: draft_id.into(),
        });
    }

    pub fn mirror_recovery(&self, snapshot: RecoverySnapshot) {
        self.send(EngineCommand::MirrorRecovery { snapshot });
    }

    pub fn clear_recovery(&self, draft_id: impl Into<String>) {
        self.send(EngineCommand::ClearRecovery {
            draft_id: draft_id.into(),
        });
    }

    pub fn submit_job(&self, kind: JobKind, ticket: u64, request: JobRequest) {
        self.send(EngineCommand::SubmitJob {
            kind,
            ticket,
            request,
        });
    }

    pub fn query_job_status(&self, kind: JobKind, ticket: u64, job_id: JobId) {
        self.send(EngineCommand::QueryJobStatus {
            kind,
            ticket,
            job_id,
        });
    }

    /// Arms `slot`, replacing whatever timer it held.
    pub fn start_timer(&self, slot: TimerSlot, token: u64, delay: Duration) {
        self.send(EngineCommand::StartTimer { slot, token, delay });
    }

    pub fn cancel_timer(&self, slot: TimerSlot) {
        self.send(EngineCommand::CancelTimer { slot });
    }

    pub fn try_recv(&self) -> Option<EngineEvent> {
        self.event_rx.try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<EngineEvent> {
        self.event_rx.recv_timeout(timeout).ok()
    }

    /// Stops the worker, aborting timers and requests still in flight.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.shutdown.cancel();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                hub_warn!("Engine thread panicked during shutdown");
            }
        }
    }

    fn send(&self, command: EngineCommand) {
        if self.cmd_tx.send(command).is_err() {
            hub_warn!("Engine worker is gone; command dropped");
        }
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

struct Worker {
    backends: Backends,
    events: mpsc::Sender<EngineEvent>,
    shutdown: CancellationToken,
    timers: HashMap<TimerSlot, JoinHandle<()>>,
}

impl Worker {
    fn new(backends: Backends, events: mpsc::Sender<EngineEvent>, shutdown: CancellationToken) -> Self {
        Self {
            backends,
            events,
            shutdown,
            timers: HashMap::new(),
        }
    }

    async fn run(mut self, mut commands: UnboundedReceiver<EngineCommand>) {
        hub_debug!("Engine worker started");
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                command = commands.recv() => match command {
                    Some(command) => self.dispatch(command),
                    None => break,
                },
            }
        }
        for (_, timer) in self.timers.drain() {
            timer.abort();
        }
        hub_debug!("Engine worker stopped");
    }

    /// Cache commands run inline so snapshots land in issue order; network
    /// commands run as tasks.
    fn dispatch(&mut self, command: EngineCommand) {
        match command {
            EngineCommand::LoadDraft { draft_id } => {
                let recovery = match self.backends.cache.load(&draft_id) {
                    Ok(Some(snapshot)) => {
                        hub_debug!(
                            "Recovery snapshot for {} written at {:?}",
                            draft_id,
                            snapshot.written_at
                        );
                        Some(snapshot)
                    }
                    Ok(None) => None,
                    Err(err) => {
                        hub_warn!("Ignoring unreadable recovery snapshot for {}: {}", draft_id, err);
                        None
                    }
                };
                let drafts = self.backends.drafts.clone();
                self.spawn(async move {
                    let remote = drafts.load_draft(&draft_id).await.map_err(HubError::from);
                    EngineEvent::DraftLoaded {
                        draft_id,
                        remote,
                        recovery,
                    }
                });
            }
            EngineCommand::PersistDraft {
                draft_id,
                flush_id,
                patch,
            } => {
                let drafts = self.backends.drafts.clone();
                self.spawn(async move {
                    let result = drafts
                        .save_draft(&draft_id, &patch)
                        .await
                        .map_err(HubError::from);
                    EngineEvent::DraftPersisted {
                        draft_id,
                        flush_id,
                        result,
                    }
                });
            }
            EngineCommand::DeleteDraft { draft_id } => {
                let drafts = self.backends.drafts.clone();
                self.spawn(async move {
                    let result = drafts.delete_draft(&draft_id).await.map_err(HubError::from);
                    EngineEvent::DraftDeleted { draft_id, result }
                });
            }
            EngineCommand::MirrorRecovery { snapshot } => {
                if let Err(err) = self.backends.cache.store(&snapshot, Utc::now()) {
                    hub_warn!("Recovery snapshot for {} not stored: {}", snapshot.draft.id, err);
                }
            }
            EngineCommand::ClearRecovery { draft_id } => match self.backends.cache.clear(&draft_id) {
                Ok(true) => hub_info!("Recovery snapshot for {} cleared", draft_id),
                Ok(false) => {}
                Err(err) => hub_warn!("Recovery snapshot for {} not cleared: {}", draft_id, err),
            },
            EngineCommand::SubmitJob {
                kind,
                ticket,
                request,
            } => {
                let jobs = self.backends.jobs.clone();
                self.spawn(async move {
                    let result = jobs.submit_job(&request).await.map_err(HubError::from);
                    EngineEvent::JobSubmitted {
                        kind,
                        ticket,
                        result,
                    }
                });
            }
            EngineCommand::QueryJobStatus {
                kind,
                ticket,
                job_id,
            } => {
                let jobs = self.backends.jobs.clone();
                self.spawn(async move {
                    let result = jobs.job_status(&job_id).await.map_err(HubError::from);
                    EngineEvent::JobStatus {
                        kind,
                        ticket,
                        result,
                    }
                });
            }
            EngineCommand::StartTimer { slot, token, delay } => {
                let events = self.events.clone();
                let shutdown = self.shutdown.clone();
                let timer = tokio::spawn(async move {
                    tokio::select! {
                        _ = shutdown.cancelled() => {}
                        _ = tokio::time::sleep(delay) => {
                            let _ = events.send(EngineEvent::TimerFired { slot, token });
                        }
                    }
                });
                if let Some(previous) = self.timers.insert(slot, timer) {
                    previous.abort();
                }
            }
            EngineCommand::CancelTimer { slot } => {
                if let Some(timer) = self.timers.remove(&slot) {
                    timer.abort();
                }
            }
        }
    }

    fn spawn<F>(&self, request: F)
    where
        F: std::future::Future<Output = EngineEvent> + Send + 'static,
    {
        let events = self.events.clone();
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown.cancelled() => {}
                event = request => {
                    let _ = events.send(event);
                }
            }
        });
    }
}
