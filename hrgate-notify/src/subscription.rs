// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::BTreeSet;
use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::stream::{BoxStream, SelectAll};
use futures_util::{Stream, StreamExt};
use hrgate_core::{ChangeEvent, ResourceKind};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing::{trace, warn};

/// Item of a [`Subscription`] stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notice {
    Changed(ChangeEvent),

    /// The subscriber fell behind and `missed` events of this type were dropped. Local state
    /// derived from earlier events can not be trusted anymore.
    Lagged { entity: ResourceKind, missed: u64 },
}

/// Stream of change notices for a set of entity types.
///
/// Dropping the subscription unsubscribes from all of them.
pub struct Subscription {
    kinds: BTreeSet<ResourceKind>,
    stream: SelectAll<BoxStream<'static, Notice>>,
}

impl Subscription {
    pub(crate) fn new(receivers: Vec<(ResourceKind, broadcast::Receiver<ChangeEvent>)>) -> Self {
        let mut kinds = BTreeSet::new();
        let mut stream = SelectAll::new();

        for (kind, receiver) in receivers {
            if !kinds.insert(kind) {
                continue;
            }

            let notices = BroadcastStream::new(receiver).map(move |item| match item {
                Ok(event) => Notice::Changed(event),
                Err(BroadcastStreamRecvError::Lagged(missed)) => {
                    warn!(entity = %kind, missed, "subscription lagged behind");
                    Notice::Lagged {
                        entity: kind,
                        missed,
                    }
                }
            });
            stream.push(notices.boxed());
        }

        Self { kinds, stream }
    }

    /// Returns `true` if events of this entity type are delivered to this subscription.
    pub fn watches(&self, kind: ResourceKind) -> bool {
        self.kinds.contains(&kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = ResourceKind> + '_ {
        self.kinds.iter().copied()
    }

    pub fn unsubscribe(self) {
        trace!(kinds = ?self.kinds, "unsubscribed");
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("kinds", &self.kinds)
            .finish_non_exhaustive()
    }
}

impl Stream for Subscription {
    type Item = Notice;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.stream.poll_next_unpin(cx)
    }
}
