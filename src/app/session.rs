use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::{
    domain::{EntitySnapshot, EntityStatus, EntityValues, FieldPath},
    form::{FormController, FormPhase, SaveError, SaveRequest, SubmitOutcome, SubmitTicket},
    validation::FieldError,
};

use super::{
    options::SessionOptions,
    saver::{EntitySaver, save_with_timeout},
};

/// Inputs serialised onto the session's controller.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    SetValue { path: FieldPath, value: Value },
    Touch(String),
    SetCustomId(String),
    Snapshot(EntitySnapshot),
    Submit,
    Discard,
}

/// Observable state published after every event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionReport {
    pub phase: FormPhase,
    pub status: EntityStatus,
    pub entity_id: Option<String>,
    pub values: EntityValues,
    pub touched: Vec<String>,
    pub dirty: bool,
    pub field_errors: Vec<FieldError>,
    pub save_error: Option<SaveError>,
    pub custom_id_error: bool,
    pub pending_snapshot: bool,
    /// Why the last edit or submit was refused, if it was.
    pub last_rejection: Option<String>,
    pub saves: u64,
}

impl SessionReport {
    fn capture(form: &FormController, last_rejection: Option<String>, saves: u64) -> Self {
        Self {
            phase: form.phase(),
            status: form.status(),
            entity_id: form.entity_id().map(str::to_string),
            values: form.values().clone(),
            touched: form.touched().iter().cloned().collect(),
            dirty: form.is_dirty(),
            field_errors: form.field_errors().to_vec(),
            save_error: form.save_error().cloned(),
            custom_id_error: form.custom_id().has_error(),
            pending_snapshot: form.has_pending_snapshot(),
            last_rejection,
            saves,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("the edit session has ended")]
    Closed,
    #[error("edit session task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Handle to a running edit session.
#[derive(Debug)]
pub struct SessionHandle {
    events: mpsc::Sender<SessionEvent>,
    report: watch::Receiver<SessionReport>,
    cancel: CancellationToken,
    task: JoinHandle<FormController>,
}

impl SessionHandle {
    pub async fn send(&self, event: SessionEvent) -> Result<(), SessionError> {
        self.events
            .send(event)
            .await
            .map_err(|_| SessionError::Closed)
    }

    pub async fn set_field(&self, key: &str, value: Value) -> Result<(), SessionError> {
        self.send(SessionEvent::SetValue {
            path: FieldPath::field(key),
            value,
        })
        .await
    }

    pub async fn snapshot(&self, snapshot: EntitySnapshot) -> Result<(), SessionError> {
        self.send(SessionEvent::Snapshot(snapshot)).await
    }

    pub async fn submit(&self) -> Result<(), SessionError> {
        self.send(SessionEvent::Submit).await
    }

    pub async fn discard(&self) -> Result<(), SessionError> {
        self.send(SessionEvent::Discard).await
    }

    /// Latest published state.
    pub fn report(&self) -> SessionReport {
        self.report.borrow().clone()
    }

    /// Waits until the published state satisfies `predicate`.
    pub async fn wait_for(
        &self,
        predicate: impl FnMut(&SessionReport) -> bool,
    ) -> Result<SessionReport, SessionError> {
        let mut report = self.report.clone();
        let matched = report
            .wait_for(predicate)
            .await
            .map_err(|_| SessionError::Closed)?;
        Ok(matched.clone())
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Tears the session down and returns the controller in its final state.
    pub async fn close(self) -> Result<FormController, SessionError> {
        self.cancel.cancel();
        Ok(self.task.await?)
    }
}

pub(crate) fn spawn_session(
    form: FormController,
    saver: Arc<dyn EntitySaver>,
    options: SessionOptions,
) -> SessionHandle {
    let (events_tx, events_rx) = mpsc::channel(options.event_buffer.max(1));
    let (report_tx, report_rx) = watch::channel(SessionReport::capture(&form, None, 0));
    let cancel = CancellationToken::new();
    let runtime = SessionRuntime {
        form,
        saver,
        options,
        report: report_tx,
        cancel: cancel.clone(),
        saves: 0,
        last_rejection: None,
        in_flight: None,
    };
    let task = tokio::spawn(runtime.run(events_rx));
    SessionHandle {
        events: events_tx,
        report: report_rx,
        cancel,
        task,
    }
}

type SaveResult = (SubmitTicket, Result<(), SaveError>);

struct SessionRuntime {
    form: FormController,
    saver: Arc<dyn EntitySaver>,
    options: SessionOptions,
    report: watch::Sender<SessionReport>,
    cancel: CancellationToken,
    saves: u64,
    last_rejection: Option<String>,
    /// Cancels the outstanding save task.
    in_flight: Option<CancellationToken>,
}

impl SessionRuntime {
    async fn run(mut self, mut events: mpsc::Receiver<SessionEvent>) -> FormController {
        let (results_tx, mut results) = mpsc::channel::<SaveResult>(1);
        info!(
            collection = self.form.collection_path(),
            id = self.form.entity_id(),
            "edit session started"
        );

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    self.form.discard();
                }
                Some((ticket, result)) = results.recv() => {
                    self.in_flight = None;
                    self.finish_save(ticket, result);
                }
                event = events.recv() => match event {
                    Some(event) => self.handle(event, &results_tx),
                    None => {
                        debug!("all session handles dropped");
                        self.form.discard();
                    }
                },
            }
            self.publish();
            if self.form.phase() == FormPhase::Discarded {
                break;
            }
        }

        if let Some(token) = self.in_flight.take() {
            token.cancel();
        }
        info!(saves = self.saves, "edit session closed");
        self.form
    }

    fn handle(&mut self, event: SessionEvent, results: &mpsc::Sender<SaveResult>) {
        let rejection = match event {
            SessionEvent::SetValue { path, value } => {
                self.form.set_value(&path, value).err().map(|err| err.to_string())
            }
            SessionEvent::Touch(key) => self.form.touch(&key).err().map(|err| err.to_string()),
            SessionEvent::SetCustomId(id) => {
                self.form.set_custom_id(&id).err().map(|err| err.to_string())
            }
            SessionEvent::Snapshot(snapshot) => {
                let outcome = self.form.apply_snapshot(snapshot);
                debug!(?outcome, "snapshot received");
                None
            }
            SessionEvent::Submit => match self.form.begin_submit() {
                Ok(request) => {
                    self.start_save(request, results);
                    None
                }
                Err(rejected) => Some(rejected.to_string()),
            },
            SessionEvent::Discard => {
                self.form.discard();
                None
            }
        };
        if let Some(reason) = &rejection {
            debug!(reason = reason.as_str(), "event rejected");
        }
        self.last_rejection = rejection;
    }

    /// The save runs on its own task; its result comes back through `results`.
    fn start_save(&mut self, request: SaveRequest, results: &mpsc::Sender<SaveResult>) {
        let token = self.cancel.child_token();
        self.in_flight = Some(token.clone());
        let saver = Arc::clone(&self.saver);
        let results = results.clone();
        let timeout = self.options.save_timeout;
        let ticket = request.ticket;
        tokio::spawn(async move {
            let result = tokio::select! {
                _ = token.cancelled() => Err(SaveError::Cancelled),
                result = save_with_timeout(saver.as_ref(), request, timeout) => result,
            };
            if results.send((ticket, result)).await.is_err() {
                debug!("session closed before the save result arrived");
            }
        });
    }

    fn finish_save(&mut self, ticket: SubmitTicket, result: Result<(), SaveError>) {
        if let SubmitOutcome::Saved = self.form.complete_submit(ticket, result) {
            self.saves += 1;
        }
    }

    fn publish(&self) {
        self.report.send_replace(SessionReport::capture(
            &self.form,
            self.last_rejection.clone(),
            self.saves,
        ));
    }
}
