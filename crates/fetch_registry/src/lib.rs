//! Registry of in-flight asynchronous operations scoped to one navigation context.
//!
//! Every operation is tagged with the registry's generation when it is
//! registered. `cancel_all` advances the generation; a settlement whose
//! generation is no longer current, or whose operation was cancelled, is
//! discarded when it is taken off the completion channel and never reaches the
//! caller. Cancellation never aborts the underlying work.

use std::{collections::HashMap, future::Future};

use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

pub type Generation = u64;

const FIRST_GENERATION: Generation = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct OperationId(u64);

/// Bookkeeping record for one registered operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingOperation {
    pub key: String,
    pub generation: Generation,
    pub cancelled: bool,
}

/// Returned by [`PromiseRegistry::register`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationTicket {
    pub key: String,
    pub generation: Generation,
}

/// A fresh result: its operation belongs to the current generation and was
/// not cancelled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settled<M> {
    pub key: String,
    pub generation: Generation,
    pub value: M,
}

struct Completion<M> {
    id: OperationId,
    generation: Generation,
    /// `None` when the operation was dropped before producing a value.
    value: Option<M>,
}

/// Reports the outcome of a spawned operation, including when the task unwinds
/// or is torn down before the operation finished.
struct CompletionGuard<M> {
    id: OperationId,
    generation: Generation,
    tx: mpsc::UnboundedSender<Completion<M>>,
    sent: bool,
}

impl<M> CompletionGuard<M> {
    fn complete(mut self, value: M) {
        self.sent = true;
        let _ = self.tx.send(Completion {
            id: self.id,
            generation: self.generation,
            value: Some(value),
        });
    }
}

impl<M> Drop for CompletionGuard<M> {
    fn drop(&mut self) {
        if !self.sent {
            let _ = self.tx.send(Completion {
                id: self.id,
                generation: self.generation,
                value: None,
            });
        }
    }
}

pub struct PromiseRegistry<M> {
    generation: Generation,
    next_id: u64,
    live: HashMap<OperationId, PendingOperation>,
    completions_tx: mpsc::UnboundedSender<Completion<M>>,
    completions_rx: mpsc::UnboundedReceiver<Completion<M>>,
}

impl<M: Send + 'static> Default for PromiseRegistry<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Send + 'static> PromiseRegistry<M> {
    pub fn new() -> Self {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        Self {
            generation: FIRST_GENERATION,
            next_id: 0,
            live: HashMap::new(),
            completions_tx,
            completions_rx,
        }
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Number of live operations of the current generation.
    pub fn pending_count(&self) -> usize {
        self.live.len()
    }

    pub fn is_idle(&self) -> bool {
        self.live.is_empty()
    }

    pub fn is_pending(&self, key: &str) -> bool {
        self.live.values().any(|op| op.key == key)
    }

    /// Starts `operation` on the current tokio runtime and tracks it under the
    /// current generation. Its result is handed out by [`Self::next_settled`]
    /// or [`Self::try_next_settled`] exactly once, unless the operation is
    /// cancelled first.
    ///
    /// A live operation already registered under `key` is superseded.
    ///
    /// Must be called from within a tokio runtime.
    pub fn register<F>(&mut self, key: impl Into<String>, operation: F) -> OperationTicket
    where
        F: Future<Output = M> + Send + 'static,
    {
        let key = key.into();
        if self.cancel(&key) {
            debug!(key = %key, generation = self.generation, "superseded live operation");
        }

        self.next_id += 1;
        let id = OperationId(self.next_id);
        let generation = self.generation;
        self.live.insert(
            id,
            PendingOperation {
                key: key.clone(),
                generation,
                cancelled: false,
            },
        );

        let guard = CompletionGuard {
            id,
            generation,
            tx: self.completions_tx.clone(),
            sent: false,
        };
        tokio::spawn(async move {
            let value = operation.await;
            guard.complete(value);
        });

        debug!(key = %key, generation, "registered operation");
        OperationTicket { key, generation }
    }

    /// Cancels every live operation and opens a new generation. Returns the
    /// cancelled records.
    pub fn cancel_all(&mut self) -> Vec<PendingOperation> {
        let cancelled: Vec<PendingOperation> = self
            .live
            .drain()
            .map(|(_, mut op)| {
                op.cancelled = true;
                op
            })
            .collect();
        self.generation += 1;
        if !cancelled.is_empty() {
            debug!(
                cancelled = cancelled.len(),
                generation = self.generation,
                "cancelled pending operations"
            );
        }
        cancelled
    }

    /// Cancels the live operation registered under `key`, leaving the
    /// generation untouched.
    pub fn cancel(&mut self, key: &str) -> bool {
        let ids: Vec<OperationId> = self
            .live
            .iter()
            .filter(|(_, op)| op.key == key)
            .map(|(id, _)| *id)
            .collect();
        for id in &ids {
            self.live.remove(id);
        }
        !ids.is_empty()
    }

    /// Waits for the next fresh settlement. Stale settlements are dropped on
    /// the way. Returns `None` once nothing of the current generation is live.
    pub async fn next_settled(&mut self) -> Option<Settled<M>> {
        loop {
            if self.live.is_empty() {
                return None;
            }
            let completion = self.completions_rx.recv().await?;
            if let Some(settled) = self.accept(completion) {
                return Some(settled);
            }
        }
    }

    /// Non-blocking counterpart of [`Self::next_settled`].
    pub fn try_next_settled(&mut self) -> Option<Settled<M>> {
        while let Ok(completion) = self.completions_rx.try_recv() {
            if let Some(settled) = self.accept(completion) {
                return Some(settled);
            }
        }
        None
    }

    fn accept(&mut self, completion: Completion<M>) -> Option<Settled<M>> {
        let Completion {
            id,
            generation,
            value,
        } = completion;

        if generation != self.generation {
            trace!(
                generation,
                current = self.generation,
                "dropped stale settlement"
            );
            return None;
        }

        let Some(op) = self.live.remove(&id) else {
            trace!(generation, "dropped settlement of cancelled operation");
            return None;
        };

        let Some(value) = value else {
            warn!(key = %op.key, generation, "operation ended without a result");
            return None;
        };

        debug!(key = %op.key, generation, "operation settled");
        Some(Settled {
            key: op.key,
            generation,
            value,
        })
    }
}

#[cfg(test)]
#[path = "tests/registry_tests.rs"]
mod tests;
