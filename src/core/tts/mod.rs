mod base;
pub mod qiniu;
pub mod voices;

pub use base::{
    MAX_SYNTHESIS_CHARS, SpeechSynthesizer, TTSConfig, TTSError, TTSResult, validate_text,
};
pub use qiniu::QiniuTTS;
pub use voices::{DEFAULT_VOICE, VOICE_CATALOG, VoiceInfo, find_voice, resolve_voice};
