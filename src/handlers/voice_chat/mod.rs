//! Streaming voice-call WebSocket (`GET /ws/voice_chat`)
//!
//! ## Client → Server
//!
//! `{"role_id": 1, "voice_url": "https://.../clip.mp3", "format": "mp3"}`
//!
//! ## Server → Client
//!
//! - `{"type": "audio", "data": "<base64>", "format": "mp3", "is_final": false}` per fragment
//! - `{"type": "audio", "data": "", "format": "mp3", "is_final": true}` after the last fragment
//! - `{"type": "text", "role_id": 1, "message": "..."}` when no audio could be produced
//! - `{"type": "error", "data": "..."}` when the turn fails

mod handler;
pub mod messages;

pub use handler::voice_chat_handler;
pub use messages::{VoiceChatOutgoing, VoiceChatRequest};
