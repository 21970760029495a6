//! Change notification
//!
//! Mutations to configuration state publish a [`ChangeEvent`] after the
//! new value is applied, so a listener that turns around and reads sees
//! the state it was told about.

mod hub;

pub use hub::{ChangeEvent, ChangeHub, Subscription};
