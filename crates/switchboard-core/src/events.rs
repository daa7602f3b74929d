//! Event sinks.
//!
//! The connector and every service report lifecycle changes and notifications
//! through an injected [`EventSink`]. The embedding application decides how to
//! observe them: a channel feeding a UI loop, a closure, or nothing at all.

use tokio::sync::mpsc;
use tracing::trace;

/// Receiver of events emitted by the connector or a service.
pub trait EventSink<E>: Send + Sync {
    /// Deliver one event. Must not block.
    fn emit(&self, event: E);
}

/// Sink that discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl<E> EventSink<E> for NullSink {
    fn emit(&self, _event: E) {}
}

impl<E: Send> EventSink<E> for mpsc::UnboundedSender<E> {
    fn emit(&self, event: E) {
        if self.send(event).is_err() {
            trace!("Event receiver dropped, discarding event");
        }
    }
}

/// Sink backed by a closure.
pub struct FnSink<F>(pub F);

impl<E, F> EventSink<E> for FnSink<F>
where
    F: Fn(E) + Send + Sync,
{
    fn emit(&self, event: E) {
        (self.0)(event)
    }
}

/// Boxed sink, the form stored by services.
pub type BoxedSink<E> = Box<dyn EventSink<E>>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_channel_sink_delivers() {
        let (tx, mut rx) = mpsc::unbounded_channel::<u32>();
        tx.emit(7);
        assert_eq!(rx.try_recv().unwrap(), 7);
    }

    #[test]
    fn test_channel_sink_tolerates_dropped_receiver() {
        let (tx, rx) = mpsc::unbounded_channel::<u32>();
        drop(rx);
        tx.emit(1);
    }

    #[test]
    fn test_fn_sink() {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();
        let sink: BoxedSink<usize> = Box::new(FnSink(move |n: usize| {
            seen.fetch_add(n, Ordering::SeqCst);
        }));
        sink.emit(2);
        sink.emit(3);
        assert_eq!(count.load(Ordering::SeqCst), 5);
    }
}
