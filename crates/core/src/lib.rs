// crates/core/src/lib.rs
pub mod classifier;
pub mod codec;
pub mod conventions;
pub mod error;
pub mod host;
pub mod popup;
pub mod probe;
pub mod protocol;
pub mod reconciler;
pub mod service;
pub mod store;

pub use classifier::{Classification, ContextClassifier};
pub use codec::*;
pub use conventions::*;
pub use error::*;
pub use host::{HostCommand, HostTransport, PageHost, SessionProbe};
pub use popup::{PopupController, PopupView};
pub use probe::*;
pub use protocol::*;
pub use reconciler::*;
pub use service::*;
pub use store::*;
