//! Session hub: the server-side embodiment of the orchestrator.
//!
//! One tokio task per active session owns that session's orchestrator
//! exclusively. Commands arrive over an mpsc channel with oneshot replies,
//! so `record_progress`/`record_answer`/`tick` for the *same* session
//! serialize while different sessions proceed fully in parallel with no
//! shared mutable state. A per-task interval drives `tick()`; closing the
//! session drops the task, and with it the interval, before the state is
//! discarded -- no leaked timer keeps firing.
//!
//! Lifecycle events are forwarded over an outbound channel; collaborators
//! persist results and progress there, outside the state transitions.

use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::error::SessionError;
use crate::events::Event;
use crate::gating::{ProgressOutcome, ProgressUpdate};
use crate::model::QuizDefinition;
use crate::session::{SessionOrchestrator, SessionPolicy};

/// Identity of one active session: which learner on which quiz.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub quiz_id: String,
    pub user_id: String,
}

impl SessionKey {
    pub fn new(quiz_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            quiz_id: quiz_id.into(),
            user_id: user_id.into(),
        }
    }
}

enum Command {
    Start {
        reply: oneshot::Sender<Result<Event, SessionError>>,
    },
    RecordProgress {
        resource_id: String,
        update: ProgressUpdate,
        reply: oneshot::Sender<ProgressOutcome>,
    },
    RecordAnswer {
        question_id: String,
        answer_id: String,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    Submit {
        reply: oneshot::Sender<Option<Event>>,
    },
    Snapshot {
        reply: oneshot::Sender<Event>,
    },
    Exit,
}

/// Client half of one session task.
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<Command>,
}

impl SessionHandle {
    pub async fn start(&self) -> Result<Event, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Start { reply }).await?;
        rx.await.map_err(|_| SessionError::SessionClosed)?
    }

    pub async fn record_progress(
        &self,
        resource_id: impl Into<String>,
        update: ProgressUpdate,
    ) -> Result<ProgressOutcome, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::RecordProgress {
            resource_id: resource_id.into(),
            update,
            reply,
        })
        .await?;
        rx.await.map_err(|_| SessionError::SessionClosed)
    }

    pub async fn record_answer(
        &self,
        question_id: impl Into<String>,
        answer_id: impl Into<String>,
    ) -> Result<(), SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::RecordAnswer {
            question_id: question_id.into(),
            answer_id: answer_id.into(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| SessionError::SessionClosed)?
    }

    /// `None` when submission was a no-op (already expired or submitted).
    pub async fn submit(&self) -> Result<Option<Event>, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Submit { reply }).await?;
        rx.await.map_err(|_| SessionError::SessionClosed)
    }

    pub async fn snapshot(&self) -> Result<Event, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Snapshot { reply }).await?;
        rx.await.map_err(|_| SessionError::SessionClosed)
    }

    async fn send(&self, command: Command) -> Result<(), SessionError> {
        self.tx
            .send(command)
            .await
            .map_err(|_| SessionError::SessionClosed)
    }
}

/// Registry of active session tasks.
pub struct SessionHub {
    sessions: HashMap<SessionKey, (SessionHandle, JoinHandle<()>)>,
    events: mpsc::Sender<Event>,
    tick_interval_ms: u64,
}

impl SessionHub {
    /// `events` receives every lifecycle event from every session.
    pub fn new(events: mpsc::Sender<Event>, tick_interval_ms: u64) -> Self {
        Self {
            sessions: HashMap::new(),
            events,
            tick_interval_ms: tick_interval_ms.max(10),
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn handle(&self, key: &SessionKey) -> Option<SessionHandle> {
        self.sessions.get(key).map(|(h, _)| h.clone())
    }

    /// Spawn the owning task for a session; returns the existing handle if
    /// the session is already open.
    pub fn open(
        &mut self,
        key: SessionKey,
        quiz: QuizDefinition,
        policy: SessionPolicy,
    ) -> SessionHandle {
        if let Some((handle, _)) = self.sessions.get(&key) {
            return handle.clone();
        }

        let (tx, rx) = mpsc::channel(32);
        let handle = SessionHandle { tx };
        let orchestrator = SessionOrchestrator::new(quiz, key.user_id.clone(), policy);
        let join = tokio::spawn(run_session(
            orchestrator,
            rx,
            self.events.clone(),
            self.tick_interval_ms,
        ));
        self.sessions.insert(key, (handle.clone(), join));
        handle
    }

    /// Close a session: the owning task (and its tick interval) stops
    /// before the state is dropped.
    pub async fn close(&mut self, key: &SessionKey) {
        if let Some((handle, join)) = self.sessions.remove(key) {
            let _ = handle.tx.send(Command::Exit).await;
            let _ = join.await;
        }
    }

    /// Close every session.
    pub async fn shutdown(&mut self) {
        let keys: Vec<_> = self.sessions.keys().cloned().collect();
        for key in keys {
            self.close(&key).await;
        }
    }
}

async fn run_session(
    mut orchestrator: SessionOrchestrator,
    mut rx: mpsc::Receiver<Command>,
    events: mpsc::Sender<Event>,
    tick_interval_ms: u64,
) {
    // Progress persisted before the hub opened the session may already
    // satisfy gating.
    if let Some(event) = orchestrator.refresh_gating(Utc::now()) {
        let _ = events.send(event).await;
    }

    let mut interval = tokio::time::interval(std::time::Duration::from_millis(tick_interval_ms));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            command = rx.recv() => {
                match command {
                    None | Some(Command::Exit) => break,
                    Some(command) => {
                        if let Some(event) = apply(&mut orchestrator, command, &events).await {
                            let _ = events.send(event).await;
                        }
                    }
                }
            }
            _ = interval.tick() => {
                if let Some(event) = orchestrator.tick(Utc::now()) {
                    let _ = events.send(event).await;
                }
            }
        }
    }
}

async fn apply(
    orchestrator: &mut SessionOrchestrator,
    command: Command,
    events: &mpsc::Sender<Event>,
) -> Option<Event> {
    let now = Utc::now();
    match command {
        Command::Start { reply } => {
            let result = orchestrator.start(now);
            let event = result.as_ref().ok().cloned();
            let _ = reply.send(result);
            event
        }
        Command::RecordProgress {
            resource_id,
            update,
            reply,
        } => {
            let (outcome, unlock) = orchestrator.record_progress(&resource_id, update, now);
            let _ = reply.send(outcome);
            if let Some(event) = unlock {
                let _ = events.send(event.clone()).await;
            }
            None
        }
        Command::RecordAnswer {
            question_id,
            answer_id,
            reply,
        } => {
            let _ = reply.send(orchestrator.record_answer(question_id, answer_id));
            None
        }
        Command::Submit { reply } => {
            let event = orchestrator.submit(now);
            let _ = reply.send(event.clone());
            event
        }
        Command::Snapshot { reply } => {
            let _ = reply.send(orchestrator.snapshot(now));
            None
        }
        Command::Exit => None,
    }
}
