mod base;
pub mod qiniu;

pub use base::{
    AudioReference, DEFAULT_AUDIO_FORMAT, STTConfig, STTError, STTResult, SpeechRecognizer,
    Transcription,
};
pub use qiniu::QiniuSTT;
