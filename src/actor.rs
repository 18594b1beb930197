//! Tracker actor
//!
//! Single entry point for keyword events and tracking queries. Events are
//! processed one at a time in arrival order; quiz generation for a crossed
//! threshold runs on its own task so the mailbox keeps draining while the
//! backend is slow.

use crate::error::{KeyquizError, Result};
use crate::quiz::{QuizCoordinator, QuizOutcome};
use crate::tracking::{Occurrence, TrackingEngine};
use crate::types::{KeywordEvent, TopicRegistration, TrackingStatus};
use ractor::{Actor, ActorProcessingErr, ActorRef, RpcReplyPort};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Messages handled by the tracker actor
pub enum TrackerMessage {
    /// Keyword observed by the event source
    KeywordFound(KeywordEvent),

    /// Snapshot of the tracked topics
    CheckTracking(RpcReplyPort<Result<TrackingStatus>>),

    /// Create or replace a topic
    RegisterTopic(TopicRegistration, RpcReplyPort<Result<()>>),

    /// Stop tracking a topic; replies whether it existed
    RemoveTopic(String, RpcReplyPort<Result<bool>>),

    /// Change a topic's threshold
    SetThreshold(String, u32, RpcReplyPort<Result<()>>),
}

pub struct TrackerState {
    engine: Arc<TrackingEngine>,
    coordinator: Arc<QuizCoordinator>,
}

pub struct TrackerActor;

impl TrackerActor {
    async fn keyword_found(state: &TrackerState, event: KeywordEvent) -> Result<()> {
        let occurrence = state
            .engine
            .record_occurrence(&event.topic, &event.keyword, event.count, event.source_context)
            .await?;

        let trigger = match occurrence {
            Occurrence::Triggered(trigger) => trigger,
            other => {
                debug!("Keyword {:?}/{:?}: {:?}", event.topic, event.keyword, other);
                return Ok(());
            }
        };

        // The session is claimed here, before the next event is handled
        let Some(pending) = state.coordinator.begin(trigger) else {
            return Ok(());
        };

        let coordinator = state.coordinator.clone();
        tokio::spawn(async move {
            let topic = pending.topic().to_string();
            let keyword = pending.keyword().to_string();
            match coordinator.fulfil(pending).await {
                QuizOutcome::Displayed { view_id, .. } => {
                    debug!("Quiz {} for {:?}/{:?} on screen", view_id, topic, keyword)
                }
                outcome => warn!("Quiz for {:?}/{:?} ended: {:?}", topic, keyword, outcome),
            }
        });
        Ok(())
    }
}

#[ractor::async_trait]
impl Actor for TrackerActor {
    type Msg = TrackerMessage;
    type State = TrackerState;
    type Arguments = (Arc<TrackingEngine>, Arc<QuizCoordinator>);

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> std::result::Result<Self::State, ActorProcessingErr> {
        info!("Tracker actor starting");
        let (engine, coordinator) = args;
        Ok(TrackerState {
            engine,
            coordinator,
        })
    }

    async fn handle(
        &self,
        _myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> std::result::Result<(), ActorProcessingErr> {
        match message {
            TrackerMessage::KeywordFound(event) => {
                // A failed event is dropped; the actor keeps serving
                if let Err(e) = Self::keyword_found(state, event).await {
                    error!("Failed to record keyword event: {}", e);
                }
            }
            TrackerMessage::CheckTracking(reply) => {
                let status = state.engine.query_tracking_status().await;
                let _ = reply.send(status);
            }
            TrackerMessage::RegisterTopic(registration, reply) => {
                let result = state.engine.register_topic(registration).await;
                let _ = reply.send(result);
            }
            TrackerMessage::RemoveTopic(name, reply) => {
                let result = state.engine.remove_topic(&name).await;
                let _ = reply.send(result);
            }
            TrackerMessage::SetThreshold(name, threshold, reply) => {
                let result = state.engine.set_threshold(&name, threshold).await;
                let _ = reply.send(result);
            }
        }

        Ok(())
    }

    async fn post_stop(
        &self,
        _myself: ActorRef<Self::Msg>,
        _state: &mut Self::State,
    ) -> std::result::Result<(), ActorProcessingErr> {
        info!("Tracker actor stopped");
        Ok(())
    }
}

/// Cloneable handle for talking to a running tracker actor
#[derive(Clone)]
pub struct TrackerHandle {
    actor: ActorRef<TrackerMessage>,
}

impl TrackerHandle {
    /// Spawn the tracker actor
    pub async fn spawn(
        engine: Arc<TrackingEngine>,
        coordinator: Arc<QuizCoordinator>,
    ) -> Result<(Self, JoinHandle<()>)> {
        let (actor, handle) = Actor::spawn(None, TrackerActor, (engine, coordinator))
            .await
            .map_err(|e| KeyquizError::Other(format!("Failed to spawn tracker actor: {}", e)))?;
        Ok((Self { actor }, handle))
    }

    pub fn actor(&self) -> &ActorRef<TrackerMessage> {
        &self.actor
    }

    /// Queue a keyword event without waiting for it to be processed
    pub fn keyword_found(&self, event: KeywordEvent) -> Result<()> {
        self.actor
            .cast(TrackerMessage::KeywordFound(event))
            .map_err(|_| unavailable())
    }

    pub async fn check_tracking(&self) -> Result<TrackingStatus> {
        ractor::call!(self.actor, TrackerMessage::CheckTracking).map_err(|_| unavailable())?
    }

    pub async fn register_topic(&self, registration: TopicRegistration) -> Result<()> {
        ractor::call!(self.actor, TrackerMessage::RegisterTopic, registration)
            .map_err(|_| unavailable())?
    }

    pub async fn remove_topic(&self, name: impl Into<String>) -> Result<bool> {
        ractor::call!(self.actor, TrackerMessage::RemoveTopic, name.into())
            .map_err(|_| unavailable())?
    }

    pub async fn set_threshold(&self, name: impl Into<String>, threshold: u32) -> Result<()> {
        ractor::call!(self.actor, TrackerMessage::SetThreshold, name.into(), threshold)
            .map_err(|_| unavailable())?
    }

    /// Stop the actor; queued events are dropped
    pub fn stop(&self) {
        self.actor.stop(None);
    }
}

fn unavailable() -> KeyquizError {
    KeyquizError::Other("tracker actor unavailable".to_string())
}
