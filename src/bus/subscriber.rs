// Bus subscribers
// Single-method delivery capability plus the stock closure and channel adapters

use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubscriberError {
    #[error("Subscriber rejected event: {0}")]
    Rejected(String),

    #[error("Subscriber channel closed")]
    Closed,

    #[error("Subscriber panicked: {0}")]
    Panicked(String),
}

/// Receives events published on a topic
pub trait Subscriber<T>: Send + Sync {
    fn deliver(&self, event: &T) -> Result<(), SubscriberError>;
}

/// Adapts a closure into a subscriber
pub struct FnSubscriber<F>(pub F);

impl<T, F> Subscriber<T> for FnSubscriber<F>
where
    F: Fn(&T) -> Result<(), SubscriberError> + Send + Sync,
{
    fn deliver(&self, event: &T) -> Result<(), SubscriberError> {
        (self.0)(event)
    }
}

/// Forwards events into an unbounded channel; never blocks the publisher
pub struct ChannelSubscriber<T> {
    sender: mpsc::UnboundedSender<T>,
}

impl<T: Clone + Send> ChannelSubscriber<T> {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<T>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (ChannelSubscriber { sender }, receiver)
    }
}

impl<T: Clone + Send> Subscriber<T> for ChannelSubscriber<T> {
    fn deliver(&self, event: &T) -> Result<(), SubscriberError> {
        self.sender
            .send(event.clone())
            .map_err(|_| SubscriberError::Closed)
    }
}
