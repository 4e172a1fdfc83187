//! Sentence segmentation of streamed reply text.
//!
//! Deltas arrive in arbitrary slices ("你好，", "今天", "天气不错。"). The segmenter
//! buffers them and cuts after every clause or sentence boundary so synthesis can
//! start on the first clause while the rest of the reply is still generating,
//! without ever splitting inside a word.
//!
//! Re-segmentation is lossless: concatenating every emitted fragment in order
//! reproduces the concatenated input exactly.

/// Punctuation that closes a synthesizable fragment
pub const BOUNDARY_MARKS: &[char] = &[
    '。', '！', '？', '；', '，', '、', '.', '!', '?', ';', ',',
];

/// One punctuation-bounded slice of reply text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextFragment {
    /// Position within the turn, starting at 0. The only delivery ordering key.
    pub ordinal: u64,
    pub text: String,
    /// Set on the trailing fragment flushed at end of stream
    pub is_final: bool,
}

impl TextFragment {
    pub fn is_speakable(&self) -> bool {
        crate::utils::text::is_speakable(&self.text)
    }
}

/// Per-turn segmenter. Owned by exactly one turn; not shared.
#[derive(Debug, Default)]
pub struct SentenceSegmenter {
    buffer: String,
    next_ordinal: u64,
}

impl SentenceSegmenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a delta and return every fragment it completes
    pub fn push(&mut self, delta: &str) -> Vec<TextFragment> {
        self.buffer.push_str(delta);

        let mut fragments = Vec::new();
        while let Some((idx, mark)) = self
            .buffer
            .char_indices()
            .find(|(_, c)| BOUNDARY_MARKS.contains(c))
        {
            let cut = idx + mark.len_utf8();
            let rest = self.buffer.split_off(cut);
            let text = std::mem::replace(&mut self.buffer, rest);
            fragments.push(self.fragment(text, false));
        }
        fragments
    }

    /// End of stream: flush whatever is left as the final fragment
    pub fn finish(&mut self) -> Option<TextFragment> {
        if self.buffer.is_empty() {
            return None;
        }
        let text = std::mem::take(&mut self.buffer);
        Some(self.fragment(text, true))
    }

    /// Number of fragments emitted so far
    pub fn emitted(&self) -> u64 {
        self.next_ordinal
    }

    fn fragment(&mut self, text: String, is_final: bool) -> TextFragment {
        let ordinal = self.next_ordinal;
        self.next_ordinal += 1;
        TextFragment {
            ordinal,
            text,
            is_final,
        }
    }
}
