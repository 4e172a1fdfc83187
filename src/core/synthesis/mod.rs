//! Ordered speech synthesis of text fragments.
//!
//! Fragments go through a bounded queue to a fixed pool of workers, each calling
//! the synthesizer independently. Workers finish in any order; a sequencer task
//! parks their outcomes in a [`ReorderBuffer`] and releases them strictly by
//! ordinal, so fragment `k + 1` is never handed out before fragment `k`.
//!
//! A failed fragment becomes [`FragmentOutcome::Dropped`] and delivery carries
//! on with the next one. Fragments with nothing pronounceable (stray
//! punctuation) are [`FragmentOutcome::Skipped`] without a provider call.
//!
//! ```rust,ignore
//! let (queue, mut outcomes) = spawn_synthesis(synthesizer, voice, &config, cancel.child_token());
//! queue.submit(fragment).await?;
//! drop(queue); // no more fragments
//! while let Some(outcome) = outcomes.next().await { /* in ordinal order */ }
//! ```

use bytes::Bytes;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::core::segmenter::TextFragment;
use crate::core::tts::SpeechSynthesizer;
use crate::errors::pipeline_error::PipelineError;

pub mod reorder;

pub use reorder::ReorderBuffer;

pub const DEFAULT_SYNTHESIS_WORKERS: usize = 3;
pub const DEFAULT_SYNTHESIS_QUEUE_CAPACITY: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SynthesisConfig {
    /// Concurrent synthesis calls per turn
    pub workers: usize,
    /// Fragments that may wait for a worker before `submit` applies backpressure
    pub queue_capacity: usize,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_SYNTHESIS_WORKERS,
            queue_capacity: DEFAULT_SYNTHESIS_QUEUE_CAPACITY,
        }
    }
}

/// Synthesized audio for one fragment
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFragment {
    pub ordinal: u64,
    pub audio: Bytes,
    pub format: String,
    pub is_final: bool,
}

/// What became of one submitted fragment
#[derive(Debug, Clone, PartialEq)]
pub enum FragmentOutcome {
    Delivered(AudioFragment),
    Dropped { ordinal: u64, reason: String },
    Skipped { ordinal: u64 },
}

impl FragmentOutcome {
    pub fn ordinal(&self) -> u64 {
        match self {
            FragmentOutcome::Delivered(fragment) => fragment.ordinal,
            FragmentOutcome::Dropped { ordinal, .. } | FragmentOutcome::Skipped { ordinal } => {
                *ordinal
            }
        }
    }
}

/// Running totals over a turn's outcomes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SynthesisTally {
    pub delivered: usize,
    pub dropped: usize,
    pub skipped: usize,
}

impl SynthesisTally {
    pub fn record(&mut self, outcome: &FragmentOutcome) {
        match outcome {
            FragmentOutcome::Delivered(_) => self.delivered += 1,
            FragmentOutcome::Dropped { .. } => self.dropped += 1,
            FragmentOutcome::Skipped { .. } => self.skipped += 1,
        }
    }

    pub fn accounted(&self) -> usize {
        self.delivered + self.dropped + self.skipped
    }
}

/// Producer side: submit fragments, drop to signal the end of the turn's text
pub struct FragmentQueue {
    tx: mpsc::Sender<TextFragment>,
}

impl FragmentQueue {
    /// Waits while the queue is full
    pub async fn submit(&self, fragment: TextFragment) -> Result<(), PipelineError> {
        self.tx
            .send(fragment)
            .await
            .map_err(|_| PipelineError::Cancelled)
    }
}

/// Consumer side: outcomes in strictly increasing ordinal order
pub struct OrderedOutcomes {
    rx: mpsc::Receiver<FragmentOutcome>,
}

impl OrderedOutcomes {
    /// `None` once every submitted fragment has been accounted for
    pub async fn next(&mut self) -> Option<FragmentOutcome> {
        self.rx.recv().await
    }
}

/// Start the worker pool and sequencer for one turn
pub fn spawn_synthesis(
    synthesizer: Arc<dyn SpeechSynthesizer>,
    voice: impl Into<Arc<str>>,
    config: &SynthesisConfig,
    cancel: CancellationToken,
) -> (FragmentQueue, OrderedOutcomes) {
    let workers = config.workers.max(1);
    let (job_tx, job_rx) = mpsc::channel::<TextFragment>(config.queue_capacity.max(1));
    let (result_tx, result_rx) = mpsc::channel::<FragmentOutcome>(workers * 2);
    let (ordered_tx, ordered_rx) = mpsc::channel::<FragmentOutcome>(workers * 2);

    let jobs = Arc::new(Mutex::new(job_rx));
    let voice: Arc<str> = voice.into();

    for id in 0..workers {
        tokio::spawn(run_worker(
            id,
            jobs.clone(),
            result_tx.clone(),
            synthesizer.clone(),
            voice.clone(),
            cancel.clone(),
        ));
    }
    // Workers hold the only senders; the sequencer sees the channel close once all are done
    drop(result_tx);

    tokio::spawn(run_sequencer(result_rx, ordered_tx, cancel));

    (
        FragmentQueue { tx: job_tx },
        OrderedOutcomes { rx: ordered_rx },
    )
}

async fn run_worker(
    id: usize,
    jobs: Arc<Mutex<mpsc::Receiver<TextFragment>>>,
    results: mpsc::Sender<FragmentOutcome>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    voice: Arc<str>,
    cancel: CancellationToken,
) {
    loop {
        let fragment = {
            let mut jobs = jobs.lock().await;
            tokio::select! {
                _ = cancel.cancelled() => None,
                fragment = jobs.recv() => fragment,
            }
        };
        let Some(fragment) = fragment else {
            break;
        };

        let outcome = tokio::select! {
            _ = cancel.cancelled() => break,
            outcome = synthesize_fragment(synthesizer.as_ref(), &voice, fragment) => outcome,
        };

        if results.send(outcome).await.is_err() {
            break;
        }
    }
    debug!(worker = id, "Synthesis worker stopped");
}

async fn synthesize_fragment(
    synthesizer: &dyn SpeechSynthesizer,
    voice: &str,
    fragment: TextFragment,
) -> FragmentOutcome {
    let ordinal = fragment.ordinal;
    if !fragment.is_speakable() {
        debug!(ordinal, "Skipping fragment with nothing to pronounce");
        return FragmentOutcome::Skipped { ordinal };
    }

    match synthesizer.synthesize(&fragment.text, voice).await {
        Ok(audio) if !audio.is_empty() => FragmentOutcome::Delivered(AudioFragment {
            ordinal,
            audio,
            format: synthesizer.format().to_string(),
            is_final: fragment.is_final,
        }),
        Ok(_) => {
            warn!(ordinal, "Dropping fragment: synthesizer returned no audio");
            FragmentOutcome::Dropped {
                ordinal,
                reason: "empty audio".to_string(),
            }
        }
        Err(e) => {
            warn!(ordinal, error = %e, "Dropping fragment after synthesis failure");
            FragmentOutcome::Dropped {
                ordinal,
                reason: e.to_string(),
            }
        }
    }
}

async fn run_sequencer(
    mut results: mpsc::Receiver<FragmentOutcome>,
    ordered: mpsc::Sender<FragmentOutcome>,
    cancel: CancellationToken,
) {
    let mut buffer = ReorderBuffer::new();

    loop {
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            outcome = results.recv() => outcome,
        };
        let Some(outcome) = outcome else {
            break;
        };

        buffer.insert(outcome);
        while let Some(ready) = buffer.pop_ready() {
            if ordered.send(ready).await.is_err() {
                return;
            }
        }
    }

    // All workers are gone. Anything still parked sits behind a gap that can
    // no longer be filled; release it in order rather than lose it.
    let remaining = buffer.drain_remaining();
    if !remaining.is_empty() {
        warn!(count = remaining.len(), "Releasing fragments behind a missing ordinal");
    }
    for outcome in remaining {
        if ordered.send(outcome).await.is_err() {
            return;
        }
    }
}
