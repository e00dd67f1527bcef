//! Progress events
//!
//! The job only produces events; it pushes them into an unbounded channel in
//! the order file operations complete. The caller owns the receiving end and
//! decides on which task or thread observers run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

/// Rough classification of an event, for observers that do not parse markup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Info,
    Success,
    Failure,
}

/// One progress report from a transmission job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransmissionEvent {
    /// Human-readable text with light markup (`<b>`, `<br>`, `<font color="red">`)
    pub message: String,
    /// Set only on the last event of a run
    pub done: bool,
    pub status: EventStatus,
    pub timestamp: DateTime<Utc>,
}

impl TransmissionEvent {
    pub fn new(message: impl Into<String>, status: EventStatus) -> Self {
        Self {
            message: message.into(),
            done: false,
            status,
            timestamp: Utc::now(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(message, EventStatus::Success)
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self::new(message, EventStatus::Failure)
    }

    /// Terminal event carrying the run summary
    pub fn done(message: impl Into<String>, status: EventStatus) -> Self {
        Self {
            done: true,
            ..Self::new(message, status)
        }
    }

    /// The message with markup removed, `<br>` turned into line breaks and
    /// the few character entities decoded.
    pub fn plain_text(&self) -> String {
        strip_markup(&self.message)
    }
}

fn strip_markup(markup: &str) -> String {
    let mut out = String::with_capacity(markup.len());
    let mut rest = markup;
    while let Some(open) = rest.find('<') {
        out.push_str(&rest[..open]);
        let Some(close) = rest[open..].find('>') else {
            out.push_str(&rest[open..]);
            rest = "";
            break;
        };
        let tag = rest[open + 1..open + close]
            .trim()
            .trim_start_matches('/')
            .to_ascii_lowercase();
        if tag.starts_with("br") {
            out.push('\n');
        }
        rest = &rest[open + close + 1..];
    }
    out.push_str(rest);
    out.replace("&#60;", "<")
        .replace("&#62;", ">")
        .replace("&#34;", "\"")
        .replace("&#38;", "&")
}

/// Receives events on a context the observer controls
pub trait TransmissionObserver {
    fn on_event(&mut self, event: &TransmissionEvent);
}

impl<F> TransmissionObserver for F
where
    F: FnMut(&TransmissionEvent),
{
    fn on_event(&mut self, event: &TransmissionEvent) {
        self(event)
    }
}

/// Fan-out to several observers, in registration order
#[derive(Default)]
pub struct ObserverSet {
    observers: Vec<Box<dyn TransmissionObserver + Send>>,
}

impl ObserverSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, observer: impl TransmissionObserver + Send + 'static) {
        self.observers.push(Box::new(observer));
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl TransmissionObserver for ObserverSet {
    fn on_event(&mut self, event: &TransmissionEvent) {
        for observer in self.observers.iter_mut() {
            observer.on_event(event);
        }
    }
}

/// Producer half, held by the job task
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<TransmissionEvent>,
}

impl EventSender {
    /// Queue an event. A caller that dropped its receiver no longer
    /// wants events, so that is not an error for the job.
    pub fn send(&self, event: TransmissionEvent) {
        if self.tx.send(event).is_err() {
            debug!("event receiver dropped, discarding event");
        }
    }
}

/// Consumer half, owned by the caller
#[derive(Debug)]
pub struct EventReceiver {
    rx: mpsc::UnboundedReceiver<TransmissionEvent>,
    finished: bool,
}

impl EventReceiver {
    /// Next event, or `None` once the terminal event has been returned or the
    /// job went away.
    pub async fn recv(&mut self) -> Option<TransmissionEvent> {
        if self.finished {
            return None;
        }
        let event = self.rx.recv().await;
        match &event {
            Some(e) if e.done => self.finished = true,
            None => self.finished = true,
            _ => {}
        }
        event
    }

    /// Deliver every event to `observer` until the terminal event has been
    /// delivered. Returns the number of events delivered.
    pub async fn dispatch<O: TransmissionObserver + ?Sized>(&mut self, observer: &mut O) -> usize {
        let mut delivered = 0;
        while let Some(event) = self.recv().await {
            observer.on_event(&event);
            delivered += 1;
        }
        delivered
    }

    /// Drain all remaining events into a vector
    pub async fn collect(&mut self) -> Vec<TransmissionEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.recv().await {
            events.push(event);
        }
        events
    }
}

/// Create a connected sender/receiver pair
pub fn event_channel() -> (EventSender, EventReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        EventSender { tx },
        EventReceiver {
            rx,
            finished: false,
        },
    )
}
