use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;

use tracing::{debug, info};

use super::client::{CompletionClient, CompletionError};
use crate::annotation::AnchorRef;
use crate::ask::AskTarget;

/// Who asked for a completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestTarget {
    Note { anchor: AnchorRef, generation: u64 },
    Ask(AskTarget),
}

#[derive(Debug)]
pub struct Completion {
    pub target: RequestTarget,
    pub result: Result<String, CompletionError>,
}

/// Runs completion requests on short-lived threads and hands results back
/// to the event loop through a channel.
pub struct CompletionWorker {
    client: Arc<dyn CompletionClient + Send + Sync>,
    sender: Sender<Completion>,
    receiver: Receiver<Completion>,
    in_flight: usize,
}

impl CompletionWorker {
    pub fn new(client: Arc<dyn CompletionClient + Send + Sync>) -> Self {
        let (sender, receiver) = mpsc::channel();
        Self { client, sender, receiver, in_flight: 0 }
    }

    pub fn dispatch(&mut self, target: RequestTarget, prompt: String) {
        let client = Arc::clone(&self.client);
        let sender = self.sender.clone();
        self.in_flight += 1;
        debug!(?target, "dispatching completion");

        std::thread::spawn(move || {
            let result = client.complete(&prompt);
            // The receiver only goes away on shutdown.
            let _ = sender.send(Completion { target, result });
        });
    }

    /// Drain every finished request without blocking.
    pub fn poll(&mut self) -> Vec<Completion> {
        let done: Vec<Completion> = self.receiver.try_iter().collect();
        self.in_flight = self.in_flight.saturating_sub(done.len());
        if !done.is_empty() {
            info!(count = done.len(), in_flight = self.in_flight, "completions received");
        }
        done
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }
}
