//! Top-level facade crate for cloudlink.
//!
//! Re-exports the protocol core and the service runtime so applications can
//! depend on a single crate.

pub mod core {
    pub use cloudlink_core::*;
}

pub mod service {
    pub use cloudlink_service::*;
}
