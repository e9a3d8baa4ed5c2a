//! Streaming search.
//!
//! A pull-model incremental scorer: the caller drives a [`SearchStream`]
//! iterator, and each pull that finds the buffer empty scores the next batch
//! of candidates (default 100 per batch). Results are emitted ordered within
//! each batch, best first.
//!
//! - **Early termination**: once at least `k` emitted-or-buffered items meet
//!   the quality threshold, remaining candidates are never scored.
//! - **Progress**: an optional callback observes `(processed, total)` after
//!   each batch.
//! - **Cancellation**: the token is checked at each batch boundary; a fired
//!   token yields one final `Err(Cancelled)` and ends the stream.
//!
//! A bounded channel with latency-based shedding is one possible transport
//! on top of this contract; the iterator itself never drops scored items.

use std::collections::VecDeque;

use crate::cancel::CancelToken;
use crate::error::{Result, StoreError};
use crate::types::{Embedding, ScoredEmbedding};

/// Default candidates scored per pull.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Progress callback: `(candidates processed, total candidates)`.
pub type ProgressFn = Box<dyn FnMut(usize, usize) + Send>;

/// Streaming options.
#[derive(Default)]
pub struct StreamOptions {
    /// Candidates scored per batch; 0 means [`DEFAULT_BATCH_SIZE`].
    pub batch_size: usize,
    /// Early-termination threshold: stop after `k` items score at least
    /// this. `None` streams every candidate.
    pub quality_threshold: Option<f32>,
    /// Invoked after each scored batch.
    pub progress: Option<ProgressFn>,
}

/// Scores one candidate; `None` skips it (e.g. unadaptable dimensions).
pub type ScoreFn = Box<dyn Fn(&Embedding) -> Option<f32> + Send>;

/// An incremental batched-scoring iterator over materialized candidates.
pub struct SearchStream {
    candidates: std::vec::IntoIter<Embedding>,
    total: usize,
    processed: usize,
    good: usize,
    k: usize,
    batch_size: usize,
    quality_threshold: Option<f32>,
    progress: Option<ProgressFn>,
    score: ScoreFn,
    buffer: VecDeque<ScoredEmbedding>,
    cancel: CancelToken,
    finished: bool,
}

impl SearchStream {
    /// Builds a stream over `candidates` scored by `score`.
    #[must_use]
    pub fn new(
        candidates: Vec<Embedding>,
        k: usize,
        score: ScoreFn,
        options: StreamOptions,
        cancel: CancelToken,
    ) -> Self {
        let total = candidates.len();
        let batch_size = if options.batch_size == 0 {
            DEFAULT_BATCH_SIZE
        } else {
            options.batch_size
        };
        Self {
            candidates: candidates.into_iter(),
            total,
            processed: 0,
            good: 0,
            k: k.max(1),
            batch_size,
            quality_threshold: options.quality_threshold,
            progress: options.progress,
            score,
            buffer: VecDeque::new(),
            cancel,
            finished: false,
        }
    }

    /// Candidates scored so far.
    #[must_use]
    pub fn processed(&self) -> usize {
        self.processed
    }

    /// Total candidates behind this stream.
    #[must_use]
    pub fn total(&self) -> usize {
        self.total
    }

    /// Scores the next batch into the buffer. Returns `false` when there was
    /// nothing left to score.
    fn fill(&mut self) -> bool {
        let mut batch: Vec<ScoredEmbedding> = Vec::with_capacity(self.batch_size);
        for _ in 0..self.batch_size {
            let Some(candidate) = self.candidates.next() else {
                break;
            };
            self.processed += 1;
            if let Some(score) = (self.score)(&candidate) {
                batch.push(ScoredEmbedding {
                    embedding: candidate,
                    score,
                });
            }
        }
        if batch.is_empty() && self.processed >= self.total {
            return false;
        }

        batch.sort_by(|a, b| b.score.total_cmp(&a.score));
        if let Some(threshold) = self.quality_threshold {
            self.good += batch.iter().filter(|i| i.score >= threshold).count();
        }
        self.buffer.extend(batch);

        if let Some(progress) = self.progress.as_mut() {
            progress(self.processed, self.total);
        }
        true
    }

    fn early_termination_reached(&self) -> bool {
        self.quality_threshold.is_some() && self.good >= self.k
    }
}

impl Iterator for SearchStream {
    type Item = Result<ScoredEmbedding>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.buffer.pop_front() {
                return Some(Ok(item));
            }
            if self.finished {
                return None;
            }
            if self.cancel.is_cancelled() {
                self.finished = true;
                return Some(Err(StoreError::Cancelled));
            }
            if self.early_termination_reached() {
                self.finished = true;
                return None;
            }
            if !self.fill() {
                self.finished = true;
                return None;
            }
        }
    }
}
