pub mod messages;
pub mod transport;

pub use messages::{ClientMessage, ReportReason, RosterEntry, ServerMessage};
pub use transport::SignalingTransport;
