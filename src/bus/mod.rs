// In-process event bus
// Independent topics for raw button edges, pre-arbitration gestures and
// resolved actions

pub mod subscriber;
pub mod topic;

pub use subscriber::{ChannelSubscriber, FnSubscriber, Subscriber, SubscriberError};
pub use topic::{DeliveryReport, SubscriptionId, Topic};

use crate::events::{ActionEvent, Proposal};
use crate::sample::ButtonEdge;

pub struct EventBus {
    /// Every button press and release, bound or not
    pub buttons: Topic<ButtonEdge>,

    /// Every proposal a recognizer emits, before arbitration
    pub gestures: Topic<Proposal>,

    /// Arbitrated actions
    pub actions: Topic<ActionEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        EventBus {
            buttons: Topic::new("buttons"),
            gestures: Topic::new("gestures"),
            actions: Topic::new("actions"),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{Action, SourceId};
    use std::sync::Arc;

    #[test]
    fn test_topics_are_independent() {
        let bus = EventBus::new();
        let (actions, mut action_rx) = ChannelSubscriber::<ActionEvent>::channel();
        let (gestures, mut gesture_rx) = ChannelSubscriber::<Proposal>::channel();
        bus.actions.subscribe(Arc::new(actions));
        bus.gestures.subscribe(Arc::new(gestures));

        let proposal = Proposal::new(Action::Parry, SourceId::inertial(0), 40);
        assert_eq!(bus.gestures.publish(&proposal).queued, 1);

        assert_eq!(gesture_rx.blocking_recv(), Some(proposal));
        assert!(action_rx.try_recv().is_err());

        let event = ActionEvent::from_proposal(&proposal);
        bus.actions.publish(&event);
        assert_eq!(action_rx.blocking_recv(), Some(event));
        assert_eq!(bus.buttons.subscriber_count(), 0);
    }
}
