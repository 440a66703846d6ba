// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed publish and subscribe channel for [`ChangeEvent`](hrgate_core::ChangeEvent)s.
//!
//! Every entity type has its own broadcast channel. Events are ephemeral, a subscriber only
//! receives events published after it subscribed and there is no replay. Subscribers which fall
//! behind are told how many events they missed and are expected to re-query.
mod config;
mod notifier;
mod subscription;

pub use config::{DEFAULT_CAPACITY, NotifierConfig};
pub use notifier::ChangeNotifier;
pub use subscription::{Notice, Subscription};
