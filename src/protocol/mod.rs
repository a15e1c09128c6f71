pub mod audit;
pub mod orchestrator;

pub use audit::{audit, AuditFinding, AuditReport};
pub use orchestrator::{GameProtocol, ProtocolConfig, ProtocolError, DEFAULT_MIN_SHOT_INTERVAL};
