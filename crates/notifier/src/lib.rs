//! Asynchronous notification pipeline.
//!
//! [`dispatcher::Notifier`] puts envelopes on a [`queue::TaskQueue`];
//! [`worker::Worker`]s take them off and run [`processor::NotificationProcessor`],
//! which commits a notification or classifies the failure as retryable or
//! permanent. Delivery is at-least-once.

pub mod dispatcher;
pub mod envelope;
pub mod error;
pub mod processor;
pub mod queue;
pub mod service;
pub mod store;
pub mod worker;
