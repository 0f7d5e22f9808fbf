// Word-level subtitle state: tokenization, highlight-index math, and
// whitespace-preserving render spans for the host.

use serde::Serialize;

/// Tokenized subtitle of one scene.
#[derive(Debug, Clone, PartialEq)]
pub struct Subtitle {
    raw: String,
    word_count: usize,
}

/// One piece of the subtitle as the host should render it. Whitespace runs
/// are their own spans so the original spacing survives.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubtitleSpan {
    pub text: String,
    pub is_word: bool,
    pub highlighted: bool,
}

impl Subtitle {
    pub fn new(text: &str) -> Self {
        let word_count = text.split_whitespace().count();
        Subtitle {
            raw: text.to_string(),
            word_count,
        }
    }

    pub fn text(&self) -> &str {
        &self.raw
    }

    pub fn word_count(&self) -> usize {
        self.word_count
    }

    /// Word to highlight at fractional playback progress `p`:
    /// `min(floor(p * W), W - 1)`. `None` when there are no words.
    pub fn highlight_index(&self, progress: f32) -> Option<usize> {
        if self.word_count == 0 {
            return None;
        }
        let p = if progress.is_finite() {
            progress.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let index = (p * self.word_count as f32).floor() as usize;
        Some(index.min(self.word_count - 1))
    }

    /// Index of the final word, highlighted when a scene completes.
    pub fn last_word_index(&self) -> Option<usize> {
        self.word_count.checked_sub(1)
    }

    /// Render spans with everything up to and including `highlight` lit.
    pub fn spans(&self, highlight: Option<usize>) -> Vec<SubtitleSpan> {
        let mut spans = Vec::new();
        let mut word_index = 0usize;
        let mut rest = self.raw.as_str();

        while !rest.is_empty() {
            let is_word = !rest.starts_with(|c: char| c.is_whitespace());
            let run_len = rest
                .find(|c: char| c.is_whitespace() == is_word)
                .unwrap_or(rest.len());
            let (run, tail) = rest.split_at(run_len);

            let highlighted = if is_word {
                let lit = matches!(highlight, Some(h) if word_index <= h);
                word_index += 1;
                lit
            } else {
                false
            };

            spans.push(SubtitleSpan {
                text: run.to_string(),
                is_word,
                highlighted,
            });
            rest = tail;
        }

        spans
    }
}
