//! Stateless pub-sub for order lifecycle events
//!
//! Other parts of the marketplace (notifications, fulfilment, operator alerting) subscribe to order events through
//! hooks. A handler only ever sees the event itself, never the engine's state. Handlers are async, and each event is
//! handled in its own task.
use std::{future::Future, pin::Pin, sync::Arc};

use log::*;
use tokio::{sync::mpsc, task::JoinSet};

pub type Handler<E> = Arc<dyn Fn(E) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Receives events of one type and runs the hook for each of them.
pub struct EventHandler<E: Send + 'static> {
    name: &'static str,
    listener: mpsc::Receiver<E>,
    sender: mpsc::Sender<E>,
    handler: Handler<E>,
}

impl<E: Send + 'static> EventHandler<E> {
    pub fn new(name: &'static str, buffer_size: usize, handler: Handler<E>) -> Self {
        let (sender, listener) = mpsc::channel(buffer_size.max(1));
        Self { name, listener, sender, handler }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn subscribe(&self) -> EventProducer<E> {
        EventProducer { sender: self.sender.clone() }
    }

    /// Runs until every producer has been dropped, then waits for the in-flight hooks to finish.
    ///
    /// A hook that panics is logged and does not take the handler down with it.
    pub async fn start_handler(self) {
        let Self { name, mut listener, sender, handler } = self;
        debug!("📬️ Starting {name} handler");
        // Only producers may keep the channel open
        drop(sender);
        let mut jobs = JoinSet::new();
        loop {
            tokio::select! {
                event = listener.recv() => match event {
                    Some(event) => {
                        trace!("📬️ {name} event received");
                        jobs.spawn((handler)(event));
                    },
                    None => break,
                },
                Some(done) = jobs.join_next(), if !jobs.is_empty() => report(name, done),
            }
        }
        if !jobs.is_empty() {
            debug!("📬️ Waiting for {} {name} hooks to complete", jobs.len());
        }
        while let Some(done) = jobs.join_next().await {
            report(name, done);
        }
        debug!("📬️ {name} handler has shut down");
    }
}

fn report(name: &str, done: Result<(), tokio::task::JoinError>) {
    match done {
        Ok(()) => trace!("📬️ {name} event handled"),
        Err(e) if e.is_panic() => error!("📬️ A {name} hook panicked. {e}"),
        Err(e) => warn!("📬️ A {name} hook was cancelled. {e}"),
    }
}

#[derive(Clone)]
pub struct EventProducer<E: Send> {
    sender: mpsc::Sender<E>,
}

impl<E: Send> EventProducer<E> {
    /// Hands the event to the handler, waiting for buffer space if needed. Events published after the handler has shut
    /// down are dropped with an error log; publishing never fails the caller.
    pub async fn publish_event(&self, event: E) {
        if self.sender.send(event).await.is_err() {
            error!("📬️ Event dropped. Its handler is no longer running.");
        }
    }
}
