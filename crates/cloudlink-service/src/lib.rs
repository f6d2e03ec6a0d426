//! cloudlink service library entry.
//!
//! Wires the envelope codec, the publisher bridge, the ack registry, the
//! command registry and the tick driver into one `CloudService`. It is
//! consumed by the simulator binary (`main.rs`) and by integration tests.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod clock;
pub mod config;
pub mod obs;
pub mod publish;
pub mod service;

pub use clock::{Clock, ManualClock, SystemClock};
pub use publish::{BackgroundPublisher, PublishFlags, PublishJob, Publisher, Transport};
pub use service::{AckStatus, CloudFlags, CloudService, CommandHandler, Dispatched, SendRequest};
