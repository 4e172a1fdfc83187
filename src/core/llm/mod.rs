mod base;
pub mod qiniu;
pub mod sse;

pub use base::{
    ChatMessage, ChatRole, DEFAULT_LLM_MODEL, DeltaStream, LLMConfig, LLMError, LLMResult,
    LanguageModel,
};
pub use qiniu::QiniuLLM;
pub use sse::{SseDecoder, SseEvent};
