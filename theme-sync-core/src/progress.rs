//! Progress reporting for long-running pipeline operations.
//!
//! A run owns one [`ProgressSink`]; components receive scoped copies of it. Each
//! scope maps its own `0.0..=1.0` range linearly into a sub-range of its parent,
//! and all scopes of a run share one high-water mark, so the fractions a
//! subscriber observes never decrease.
//!
//! Events are delivered over an unbounded channel from whatever thread does the
//! work. A sink created with [`ProgressSink::none`] has no subscriber and drops
//! everything.

use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::trace;

/// One progress update: what is happening and how far the whole run has got.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressEvent {
    pub label: String,
    pub fraction: f64,
}

#[derive(Debug, Clone)]
pub struct ProgressSink {
    tx: Option<UnboundedSender<ProgressEvent>>,
    start: f64,
    end: f64,
    high_water: Arc<Mutex<f64>>,
}

impl Default for ProgressSink {
    fn default() -> Self {
        Self::none()
    }
}

impl ProgressSink {
    /// A sink without subscriber.
    pub fn none() -> Self {
        Self {
            tx: None,
            start: 0.0,
            end: 1.0,
            high_water: Arc::new(Mutex::new(0.0)),
        }
    }

    /// A sink covering the full range, plus the receiving half for the subscriber.
    pub fn channel() -> (Self, UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = unbounded_channel();
        let sink = Self {
            tx: Some(tx),
            ..Self::none()
        };
        (sink, rx)
    }

    /// Narrow this sink to `[from, to]` of its own range.
    pub fn scoped(&self, from: f64, to: f64) -> Self {
        Self {
            tx: self.tx.clone(),
            start: self.map(from),
            end: self.map(to),
            high_water: Arc::clone(&self.high_water),
        }
    }

    pub fn has_subscriber(&self) -> bool {
        self.tx.is_some()
    }

    /// Emit `label` at `fraction` of this sink's range.
    pub fn report(&self, label: impl Into<String>, fraction: f64) {
        let global = self.map(fraction);
        self.emit(label.into(), global);
    }

    /// Emit a message without moving the progress forward.
    pub fn message(&self, label: impl Into<String>) {
        let current = self.current().clamp(self.start, self.end);
        self.emit(label.into(), current);
    }

    /// Highest fraction emitted so far across the whole run.
    pub fn current(&self) -> f64 {
        *self.high_water.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn map(&self, fraction: f64) -> f64 {
        let t = if fraction.is_nan() { 0.0 } else { fraction.clamp(0.0, 1.0) };
        // lerp in this form hits both endpoints exactly
        self.start * (1.0 - t) + self.end * t
    }

    fn emit(&self, label: String, global: f64) {
        let fraction = {
            let mut high_water = self.high_water.lock().unwrap_or_else(PoisonError::into_inner);
            if global > *high_water {
                *high_water = global;
            }
            *high_water
        };
        let Some(tx) = &self.tx else {
            return;
        };
        trace!(label = %label, fraction, "progress");
        // A dropped receiver only means nobody is listening any more.
        let _ = tx.send(ProgressEvent { label, fraction });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(rx: &mut UnboundedReceiver<ProgressEvent>) -> Vec<ProgressEvent> {
        let mut events = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            events.push(ev);
        }
        events
    }

    #[test]
    fn scoped_sink_maps_into_parent_range() {
        let (sink, mut rx) = ProgressSink::channel();
        let provider = sink.scoped(0.5, 1.0);
        let band = provider.scoped(0.0, 0.3);

        band.report("half of band", 0.5);
        provider.report("done", 1.0);

        let events = drain(&mut rx);
        assert_eq!(events.len(), 2);
        assert!((events[0].fraction - 0.575).abs() < 1e-9);
        assert_eq!(events[1].fraction, 1.0);
    }

    #[test]
    fn fractions_never_decrease() {
        let (sink, mut rx) = ProgressSink::channel();
        sink.report("a", 0.4);
        sink.report("b", 0.2);
        sink.message("note");
        sink.report("c", 0.9);

        let fractions: Vec<f64> = drain(&mut rx).into_iter().map(|e| e.fraction).collect();
        assert_eq!(fractions, vec![0.4, 0.4, 0.4, 0.9]);
    }

    #[test]
    fn out_of_range_input_is_clamped() {
        let (sink, mut rx) = ProgressSink::channel();
        let scoped = sink.scoped(0.25, 0.5);
        scoped.report("over", 7.0);
        scoped.report("nan", f64::NAN);

        let events = drain(&mut rx);
        assert_eq!(events[0].fraction, 0.5);
        assert_eq!(events[1].fraction, 0.5);
    }

    #[test]
    fn none_sink_tracks_progress_without_subscriber() {
        let sink = ProgressSink::none();
        assert!(!sink.has_subscriber());
        sink.report("ignored", 0.7);
        assert_eq!(sink.current(), 0.7);
    }
}
