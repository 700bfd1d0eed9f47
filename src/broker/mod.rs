//! Type-indexed publish/subscribe.
//!
//! ## Contents
//! - [`EventBroker`] registry of subscriber groups keyed by declared type
//! - [`Event`], [`Lineage`] publishable types and their declared supertypes
//! - [`SubscriberGroup`], [`Handle`] handlers for one declared type
//! - [`Subscription`] removes one handler
//! - [`PublishResult`] optional wait for all handlers of one publish

mod core;
mod event;
mod group;
mod publish;
mod subscription;

pub use self::core::EventBroker;
pub use event::{Event, Lineage};
pub use group::{Handle, SubscriberGroup};
pub use publish::PublishResult;
pub use subscription::Subscription;
