// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use hrgate_core::{ChangeEvent, ResourceKind};
use tokio::sync::broadcast;
use tracing::trace;

use crate::config::NotifierConfig;
use crate::subscription::Subscription;

type Senders = HashMap<ResourceKind, broadcast::Sender<ChangeEvent>>;

/// Publishes change events to everyone subscribed to their entity type.
///
/// Publishing never waits for subscribers. The notifier can be cloned and all clones share the
/// same channels.
#[derive(Clone, Debug)]
pub struct ChangeNotifier {
    senders: Arc<RwLock<Senders>>,
    capacity: usize,
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new(NotifierConfig::default())
    }
}

impl ChangeNotifier {
    pub fn new(config: NotifierConfig) -> Self {
        Self {
            senders: Arc::default(),
            capacity: config.capacity.max(1),
        }
    }

    fn sender(&self, kind: ResourceKind) -> broadcast::Sender<ChangeEvent> {
        if let Some(sender) = self
            .senders
            .read()
            .expect("acquire shared read access on senders")
            .get(&kind)
        {
            return sender.clone();
        }

        self.senders
            .write()
            .expect("acquire exclusive write access on senders")
            .entry(kind)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }

    /// Publishes an event to all subscribers of its entity type.
    ///
    /// Returns the number of subscriptions the event was handed to.
    pub fn publish(&self, event: ChangeEvent) -> usize {
        let entity = event.entity;
        let record = event.id;
        match self.sender(entity).send(event) {
            Ok(receivers) => {
                trace!(%entity, %record, receivers, "published change event");
                receivers
            }
            Err(_) => {
                trace!(%entity, %record, "no subscribers for change event");
                0
            }
        }
    }

    /// Subscribes to events of the given entity types.
    ///
    /// Only events published after this call are received.
    pub fn subscribe(&self, kinds: impl IntoIterator<Item = ResourceKind>) -> Subscription {
        let receivers = kinds
            .into_iter()
            .map(|kind| (kind, self.sender(kind).subscribe()))
            .collect::<Vec<_>>();
        Subscription::new(receivers)
    }

    /// Number of live subscriptions watching the given entity type.
    pub fn subscriber_count(&self, kind: ResourceKind) -> usize {
        self.senders
            .read()
            .expect("acquire shared read access on senders")
            .get(&kind)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }
}
