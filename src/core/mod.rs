pub mod compactor;
pub mod context;
pub mod llm;
pub mod segmenter;
pub mod stt;
pub mod synthesis;
pub mod tts;
pub mod turn;

/// Default base URL shared by the recognition, generation and synthesis APIs
pub const QINIU_API_BASE: &str = "https://openai.qiniu.com/v1";

// Re-export commonly used types for convenience
pub use compactor::{CompactionOutcome, CompactorConfig, HistoryCompactor, TurnExchange};
pub use context::{ContextAssembler, ConversationContext};
pub use llm::{ChatMessage, LLMConfig, LLMError, LanguageModel, QiniuLLM};
pub use segmenter::{SentenceSegmenter, TextFragment};
pub use stt::{AudioReference, QiniuSTT, STTConfig, STTError, SpeechRecognizer, Transcription};
pub use synthesis::{AudioFragment, FragmentOutcome, SynthesisConfig};
pub use tts::{QiniuTTS, SpeechSynthesizer, TTSConfig, TTSError};
pub use turn::{
    ChatInput, ChatReply, ChatTurnRequest, ResponseMode, TurnComponents, TurnPipeline,
    TurnReport, TurnSettings, TurnSink, VoiceTurnRequest,
};
