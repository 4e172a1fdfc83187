//! One conversation turn, end to end.
//!
//! Voice turns stream: recognition, context, a streamed reply fed through the
//! sentence segmenter into ordered synthesis, with audio handed to a
//! [`TurnSink`] fragment by fragment. Text-chat turns use a single completion
//! and optionally synthesize the whole reply at once.
//!
//! Both turn kinds persist the exchange once a reply exists and then start a
//! detached compaction of the rolling summary. Persistence failures are logged
//! and never reach the client.

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::compactor::{CompactorConfig, HistoryCompactor, TurnExchange};
use crate::core::context::{ContextAssembler, ConversationContext};
use crate::core::llm::{DeltaStream, LanguageModel};
use crate::core::segmenter::SentenceSegmenter;
use crate::core::stt::{AudioReference, SpeechRecognizer, Transcription};
use crate::core::synthesis::{
    AudioFragment, FragmentOutcome, FragmentQueue, SynthesisConfig, SynthesisTally,
    spawn_synthesis,
};
use crate::core::tts::SpeechSynthesizer;
use crate::errors::pipeline_error::{PipelineError, PipelineResult};
use crate::store::{ConversationStore, HistoryCache, Modality, NewTurn, RoleId, UserId};

/// Where a voice turn's output goes
#[async_trait]
pub trait TurnSink: Send {
    async fn deliver_audio(&mut self, fragment: AudioFragment) -> PipelineResult<()>;

    /// Whole reply as text, used when no audio could be produced
    async fn deliver_text(&mut self, role_id: RoleId, text: &str) -> PipelineResult<()>;

    /// Terminal marker, sent once every fragment has been accounted for
    async fn finish_turn(&mut self, format: &str) -> PipelineResult<()>;
}

#[derive(Debug, Clone)]
pub struct VoiceTurnRequest {
    pub user_id: UserId,
    pub role_id: RoleId,
    pub audio: AudioReference,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnReport {
    pub reply: String,
    pub delivered: usize,
    pub dropped: usize,
    pub skipped: usize,
    pub fell_back_to_text: bool,
}

#[derive(Debug, Clone)]
pub enum ChatInput {
    Text(String),
    Voice(AudioReference),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseMode {
    Text,
    Voice,
}

#[derive(Debug, Clone)]
pub struct ChatTurnRequest {
    pub user_id: UserId,
    pub role_id: RoleId,
    pub input: ChatInput,
    pub response: ResponseMode,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChatReply {
    Text(String),
    Voice {
        text: String,
        audio: Bytes,
        format: String,
    },
}

/// External collaborators a pipeline is built from
#[derive(Clone)]
pub struct TurnComponents {
    pub recognizer: Arc<dyn SpeechRecognizer>,
    pub llm: Arc<dyn LanguageModel>,
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
    pub store: Arc<dyn ConversationStore>,
    pub cache: Arc<dyn HistoryCache>,
}

#[derive(Debug, Clone)]
pub struct TurnSettings {
    pub history_window: usize,
    pub default_voice: String,
    pub synthesis: SynthesisConfig,
    pub compactor: CompactorConfig,
}

impl Default for TurnSettings {
    fn default() -> Self {
        Self {
            history_window: crate::core::context::DEFAULT_HISTORY_WINDOW,
            default_voice: crate::core::tts::DEFAULT_VOICE.to_string(),
            synthesis: SynthesisConfig::default(),
            compactor: CompactorConfig::default(),
        }
    }
}

pub struct TurnPipeline {
    recognizer: Arc<dyn SpeechRecognizer>,
    llm: Arc<dyn LanguageModel>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    store: Arc<dyn ConversationStore>,
    cache: Arc<dyn HistoryCache>,
    assembler: ContextAssembler,
    compactor: Arc<HistoryCompactor>,
    settings: TurnSettings,
}

impl TurnPipeline {
    pub fn new(components: TurnComponents, settings: TurnSettings) -> Self {
        let TurnComponents {
            recognizer,
            llm,
            synthesizer,
            store,
            cache,
        } = components;

        let assembler = ContextAssembler::new(store.clone(), settings.history_window);
        let compactor = Arc::new(HistoryCompactor::new(
            llm.clone(),
            store.clone(),
            cache.clone(),
            settings.compactor,
        ));

        Self {
            recognizer,
            llm,
            synthesizer,
            store,
            cache,
            assembler,
            compactor,
            settings,
        }
    }

    /// Run a streamed voice turn.
    ///
    /// Cancelling `cancel` abandons in-flight provider calls and synthesis
    /// workers; nothing further reaches `sink` and nothing is persisted.
    pub async fn run_voice_turn(
        &self,
        request: VoiceTurnRequest,
        sink: &mut dyn TurnSink,
        cancel: &CancellationToken,
    ) -> PipelineResult<TurnReport> {
        let VoiceTurnRequest {
            user_id,
            role_id,
            audio,
        } = request;
        let started = Instant::now();
        info!(user_id, role_id, "Voice turn started");

        let user_text = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PipelineError::Cancelled),
            text = self.transcribe(&audio) => text?,
        };

        let context = self.assembler.load(user_id, role_id).await?;
        let voice = context.voice(&self.settings.default_voice).to_string();

        let deltas = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PipelineError::Cancelled),
            deltas = self.llm.stream_reply(context.build_messages(&user_text)) => deltas?,
        };

        // Workers stop with the turn, however it ends
        let turn_cancel = cancel.child_token();
        let _workers = turn_cancel.clone().drop_guard();
        let (queue, mut outcomes) = spawn_synthesis(
            self.synthesizer.clone(),
            voice,
            &self.settings.synthesis,
            turn_cancel,
        );

        let drain = async {
            let mut tally = SynthesisTally::default();
            while let Some(outcome) = outcomes.next().await {
                tally.record(&outcome);
                if let FragmentOutcome::Delivered(fragment) = outcome {
                    sink.deliver_audio(fragment).await?;
                }
            }
            Ok::<_, PipelineError>(tally)
        };

        let (reply, tally) = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PipelineError::Cancelled),
            joined = async { tokio::try_join!(feed_fragments(deltas, queue), drain) } => joined?,
        };

        if reply.trim().is_empty() {
            return Err(PipelineError::Generation("empty reply".to_string()));
        }

        let fell_back_to_text = tally.delivered == 0;
        if fell_back_to_text {
            warn!(
                user_id,
                role_id,
                dropped = tally.dropped,
                "No audio synthesized, sending reply as text"
            );
            sink.deliver_text(role_id, &reply).await?;
        }
        sink.finish_turn(self.synthesizer.format()).await?;

        let modality = if fell_back_to_text {
            Modality::Text
        } else {
            Modality::Voice
        };
        self.persist_exchange(
            NewTurn::user_voice(user_id, role_id, user_text.clone(), audio.url),
            NewTurn::assistant(user_id, role_id, reply.clone(), modality),
        )
        .await;
        self.compact(&context, user_text, reply.clone());

        info!(
            user_id,
            role_id,
            delivered = tally.delivered,
            dropped = tally.dropped,
            skipped = tally.skipped,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Voice turn complete"
        );

        Ok(TurnReport {
            reply,
            delivered: tally.delivered,
            dropped: tally.dropped,
            skipped: tally.skipped,
            fell_back_to_text,
        })
    }

    /// Run a text-chat turn with a single completion
    pub async fn run_chat_turn(&self, request: ChatTurnRequest) -> PipelineResult<ChatReply> {
        let ChatTurnRequest {
            user_id,
            role_id,
            input,
            response,
        } = request;

        let (user_text, audio_ref) = match input {
            ChatInput::Text(text) => {
                if text.trim().is_empty() {
                    return Err(PipelineError::Input("message is empty".to_string()));
                }
                (text, None)
            }
            ChatInput::Voice(audio) => (self.transcribe(&audio).await?, Some(audio.url)),
        };

        let context = self.assembler.load(user_id, role_id).await?;
        let reply = self
            .llm
            .complete(context.build_messages(&user_text))
            .await?
            .trim()
            .to_string();
        if reply.is_empty() {
            return Err(PipelineError::Generation("empty reply".to_string()));
        }

        let chat_reply = match response {
            ResponseMode::Text => ChatReply::Text(reply.clone()),
            ResponseMode::Voice => {
                let voice = context.voice(&self.settings.default_voice);
                match self.synthesizer.synthesize(&reply, voice).await {
                    Ok(audio) => ChatReply::Voice {
                        text: reply.clone(),
                        audio,
                        format: self.synthesizer.format().to_string(),
                    },
                    Err(e) => {
                        warn!(user_id, role_id, error = %e, "Reply synthesis failed, answering in text");
                        ChatReply::Text(reply.clone())
                    }
                }
            }
        };

        let user_turn = match audio_ref {
            Some(url) => NewTurn::user_voice(user_id, role_id, user_text.clone(), url),
            None => NewTurn::user_text(user_id, role_id, user_text.clone()),
        };
        let modality = match chat_reply {
            ChatReply::Text(_) => Modality::Text,
            ChatReply::Voice { .. } => Modality::Voice,
        };
        self.persist_exchange(
            user_turn,
            NewTurn::assistant(user_id, role_id, reply.clone(), modality),
        )
        .await;
        self.compact(&context, user_text, reply);

        Ok(chat_reply)
    }

    async fn transcribe(&self, audio: &AudioReference) -> PipelineResult<String> {
        match self.recognizer.recognize(audio).await? {
            Transcription::Speech(text) => Ok(text),
            Transcription::NoSpeech => Err(PipelineError::NoSpeech),
        }
    }

    async fn persist_exchange(&self, user_turn: NewTurn, assistant_turn: NewTurn) {
        let user_id = user_turn.user_id;
        for turn in [user_turn, assistant_turn] {
            if let Err(e) = self.store.append_turn(turn).await {
                warn!(user_id, error = %e, "Failed to save conversation turn");
            }
        }
        self.cache.invalidate_user(user_id).await;
    }

    fn compact(&self, context: &ConversationContext, user_text: String, reply: String) {
        self.compactor.spawn(TurnExchange {
            user_id: context.user_id,
            role_id: context.role.id,
            user_text,
            reply,
        });
    }
}

/// Segment the reply stream into the synthesis queue; returns the full reply.
///
/// A stream error before any text fails the turn. After some text it ends the
/// reply early, keeping what was already generated.
async fn feed_fragments(mut deltas: DeltaStream, queue: FragmentQueue) -> PipelineResult<String> {
    let mut segmenter = SentenceSegmenter::new();
    let mut reply = String::new();

    while let Some(delta) = deltas.next().await {
        match delta {
            Ok(text) => {
                reply.push_str(&text);
                for fragment in segmenter.push(&text) {
                    queue.submit(fragment).await?;
                }
            }
            Err(e) if reply.is_empty() => return Err(e.into()),
            Err(e) => {
                warn!(error = %e, chars = reply.chars().count(), "Reply stream cut short");
                break;
            }
        }
    }

    if let Some(fragment) = segmenter.finish() {
        queue.submit(fragment).await?;
    }
    debug!(fragments = segmenter.emitted(), "Reply stream finished");
    Ok(reply)
}
