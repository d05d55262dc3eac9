// crates/types/src/lib.rs
//! Shared data model for the debug-mode inspector.
//!
//! These types cross process boundaries (background worker, transient popup,
//! in-page shim), so everything here is serde-serialisable and, behind the
//! `codegen` feature, exported as TypeScript bindings.

pub mod context;
pub mod debug;
pub mod protocol;
pub mod session;

pub use context::*;
pub use debug::*;
pub use protocol::*;
pub use session::*;
