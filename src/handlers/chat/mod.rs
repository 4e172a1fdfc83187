//! Text-chat WebSocket (`GET /ws/chat`)
//!
//! ## Client → Server
//!
//! `{"role_id": 1, "message": "...", "type": "text"|"voice", "format": "mp3", "response_type": 0}`
//!
//! For `"type": "voice"` the message is the URL of a recorded clip.
//! `response_type` is 0 for text, 1 for voice, 2 to let the server pick.
//!
//! ## Server → Client
//!
//! - `{"type": "text", "role_id": 1, "message": "..."}`
//! - `{"type": "voice", "role_id": 1, "message": "<base64>", "format": "mp3"}`
//! - `{"error": "..."}`

mod handler;
pub mod messages;

pub use handler::chat_handler;
pub use messages::{ChatOutgoing, ChatRequest};
