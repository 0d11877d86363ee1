//! Per-phase result sink.
//!
//! Each phase of each run gets a fresh [`PhaseSink`]. Workers push
//! `(slot, outcome)` pairs through cloned [`SinkWriter`]s; the orchestrator
//! drains the sink only after the phase's join has finished or its deadline
//! has passed. Nothing in a sink outlives the phase that created it.

use std::collections::BTreeMap;

use tokio::sync::mpsc;

use crate::backends::AdapterOutcome;

/// Receiving half, owned by the orchestrator for one phase.
#[derive(Debug)]
pub struct PhaseSink<K> {
    tx: mpsc::UnboundedSender<(K, AdapterOutcome)>,
    rx: mpsc::UnboundedReceiver<(K, AdapterOutcome)>,
}

/// Sending half, one clone per worker.
#[derive(Debug, Clone)]
pub struct SinkWriter<K> {
    tx: mpsc::UnboundedSender<(K, AdapterOutcome)>,
}

impl<K: Ord> PhaseSink<K> {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx }
    }

    pub fn writer(&self) -> SinkWriter<K> {
        SinkWriter { tx: self.tx.clone() }
    }

    /// Take everything delivered so far, keyed by slot.
    ///
    /// A slot written twice keeps its first outcome.
    pub fn drain(mut self) -> BTreeMap<K, AdapterOutcome> {
        let mut results = BTreeMap::new();
        while let Ok((key, outcome)) = self.rx.try_recv() {
            results.entry(key).or_insert(outcome);
        }
        results
    }
}

impl<K: Ord> Default for PhaseSink<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> SinkWriter<K> {
    /// Deliver one outcome. Ignored once the sink has been drained.
    pub fn put(&self, key: K, outcome: AdapterOutcome) {
        let _ = self.tx.send((key, outcome));
    }
}
