//! Run progress notifications.
//!
//! `AgentObserver` is the sink the assembler and scheduler report to. Closures,
//! the broadcast `EventBus`, and `NoopObserver` all implement it.

pub mod bus;
pub mod observer;

pub use bus::EventBus;
pub use observer::{AgentObserver, NoopObserver};
