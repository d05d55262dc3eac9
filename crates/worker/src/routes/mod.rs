// crates/worker/src/routes/mod.rs
pub mod events;
pub mod message;

pub use events::{address_changed, session_closed};
pub use message::message;
