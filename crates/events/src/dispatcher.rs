//! Event dispatcher.
//!
//! Accepted events go into a bounded queue. A fixed pool of worker tasks
//! drains it; each event fans out to one task per affected player so a
//! failure or panic while processing one player never affects another.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use podium_core::context::GameEvent;
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::ledger::{PlayerOutcome, ProgressLedger};
use crate::metrics::EngineMetrics;

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Event queue is full")]
    QueueFull,

    #[error("Event queue is closed")]
    Closed,
}

pub struct EventDispatcher {
    sender: mpsc::Sender<GameEvent>,
    receiver: Mutex<mpsc::Receiver<GameEvent>>,
    ledger: Arc<ProgressLedger>,
    metrics: Arc<EngineMetrics>,
    workers: usize,
}

impl EventDispatcher {
    pub fn new(
        ledger: Arc<ProgressLedger>,
        metrics: Arc<EngineMetrics>,
        queue_capacity: usize,
        workers: usize,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(queue_capacity.max(1));
        Self {
            sender,
            receiver: Mutex::new(receiver),
            ledger,
            metrics,
            workers: workers.max(1),
        }
    }

    // -----------------------------------------------------------------------
    // Intake
    // -----------------------------------------------------------------------

    /// Queue an event without waiting. Fails with [`DispatchError::QueueFull`]
    /// when the queue is at capacity.
    pub fn try_submit(&self, event: GameEvent) -> Result<(), DispatchError> {
        match self.sender.try_send(event) {
            Ok(()) => {
                EngineMetrics::incr(&self.metrics.events_accepted);
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(event)) => {
                EngineMetrics::incr(&self.metrics.events_rejected);
                tracing::warn!(event_id = %event.id, "Event queue full, rejecting event");
                Err(DispatchError::QueueFull)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(DispatchError::Closed),
        }
    }

    /// Queue an event, waiting for capacity.
    pub async fn submit(&self, event: GameEvent) -> Result<(), DispatchError> {
        self.sender
            .send(event)
            .await
            .map_err(|_| DispatchError::Closed)?;
        EngineMetrics::incr(&self.metrics.events_accepted);
        Ok(())
    }

    /// Free queue slots.
    pub fn remaining_capacity(&self) -> usize {
        self.sender.capacity()
    }

    // -----------------------------------------------------------------------
    // Workers
    // -----------------------------------------------------------------------

    /// Start the worker pool. Workers exit when `cancel` fires.
    pub fn spawn_workers(self: &Arc<Self>, cancel: CancellationToken) -> Vec<JoinHandle<()>> {
        (0..self.workers)
            .map(|worker| {
                let dispatcher = Arc::clone(self);
                let cancel = cancel.clone();
                tokio::spawn(async move { dispatcher.run_worker(worker, cancel).await })
            })
            .collect()
    }

    async fn run_worker(&self, worker: usize, cancel: CancellationToken) {
        tracing::info!(worker, "Event worker started");
        loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!(worker, "Event worker shutting down");
                    break;
                }
                event = async { self.receiver.lock().await.recv().await } => event,
            };
            let Some(event) = next else {
                tracing::info!(worker, "Event queue closed, worker exiting");
                break;
            };
            self.process_event(&event).await;
        }
    }

    /// Evaluate one event for every affected player concurrently.
    ///
    /// Returns the outcomes of the players that completed; failed and
    /// panicked players are logged and counted.
    pub async fn process_event(&self, event: &GameEvent) -> Vec<PlayerOutcome> {
        let players = event.affected_players();
        if players.is_empty() {
            tracing::debug!(event_id = %event.id, "Event has no affected players");
            return Vec::new();
        }
        tracing::debug!(
            event_id = %event.id,
            event_type = event.event_type.as_str(),
            players = players.len(),
            "Processing event"
        );

        let tasks = players.iter().map(|&player_id| {
            let task = AssertUnwindSafe(self.ledger.process_player(event, player_id)).catch_unwind();
            async move { (player_id, task.await) }
        });

        let mut outcomes = Vec::with_capacity(players.len());
        for (player_id, result) in futures::future::join_all(tasks).await {
            match result {
                Ok(Ok(outcome)) => {
                    EngineMetrics::incr(&self.metrics.player_tasks_completed);
                    outcomes.push(outcome);
                }
                Ok(Err(e)) => {
                    EngineMetrics::incr(&self.metrics.player_tasks_failed);
                    tracing::error!(
                        event_id = %event.id,
                        player_id,
                        error = %e,
                        "Player evaluation failed"
                    );
                }
                Err(panic) => {
                    EngineMetrics::incr(&self.metrics.player_tasks_failed);
                    tracing::error!(
                        event_id = %event.id,
                        player_id,
                        panic = %panic_message(panic.as_ref()),
                        "Player evaluation panicked"
                    );
                }
            }
        }
        outcomes
    }

    /// Forward events published on the bus into the queue until the bus
    /// closes or `cancel` fires.
    pub async fn run_bus_listener(
        &self,
        mut receiver: broadcast::Receiver<GameEvent>,
        cancel: CancellationToken,
    ) {
        tracing::info!("Bus listener started");
        loop {
            let received = tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Bus listener shutting down");
                    break;
                }
                received = receiver.recv() => received,
            };
            match received {
                Ok(event) => {
                    if let Err(e) = self.submit(event).await {
                        tracing::error!(error = %e, "Failed to queue bus event");
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Bus listener lagged, some events were dropped");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, bus listener shutting down");
                    break;
                }
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
