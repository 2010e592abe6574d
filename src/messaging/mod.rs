//! Two-Phase Messaging Handshake (spec §4.4, component J).

pub mod models;
pub mod service;

pub use models::{Chat, ChatMessage, ChatState, ChatSummary};
pub use service::MessagingService;
