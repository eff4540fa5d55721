//! Caller-facing entry point: one normalization at a time, off the caller's
//! thread.
//!
//! A [`MediaSession`] pairs a [`Normalizer`] with an [`OperationSlot`].
//! Every entry point claims the slot first and fails fast with
//! [`PipelineError::OperationInProgress`] if it is taken.
//!
//! | Entry point | Runs on | Slot claims |
//! |---|---|---|
//! | [`normalize`](MediaSession::normalize) | tokio blocking pool | one per call |
//! | [`normalize_blocking`](MediaSession::normalize_blocking) | caller's thread | one per call |
//! | [`normalize_many`](MediaSession::normalize_many) | rayon pool, one file per worker | one per batch |

use crate::arbiter::OperationSlot;
use crate::imaging::ImageBackend;
use crate::pipeline::{NormalizeOutcome, NormalizeRequest, Normalizer, PipelineError};
use rayon::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;

pub struct MediaSession<B: ImageBackend> {
    normalizer: Arc<Normalizer<B>>,
    slot: Arc<OperationSlot>,
}

impl<B> MediaSession<B>
where
    B: ImageBackend + Send + 'static,
{
    pub fn new(normalizer: Normalizer<B>) -> Self {
        Self {
            normalizer: Arc::new(normalizer),
            slot: Arc::new(OperationSlot::new()),
        }
    }

    pub fn normalizer(&self) -> &Normalizer<B> {
        &self.normalizer
    }

    pub fn slot(&self) -> &Arc<OperationSlot> {
        &self.slot
    }

    pub fn is_busy(&self) -> bool {
        self.slot.is_busy()
    }

    /// Normalize one file on tokio's blocking pool.
    ///
    /// The slot claim moves into the worker, so it is held until the file
    /// work finishes even if this future is dropped first. A panicking
    /// worker is reported as [`PipelineError::Worker`].
    pub async fn normalize(
        &self,
        request: NormalizeRequest,
    ) -> Result<NormalizeOutcome, PipelineError> {
        let guard = self.slot.try_acquire()?;
        let normalizer = Arc::clone(&self.normalizer);

        tokio::task::spawn_blocking(move || {
            let _guard = guard;
            normalizer.normalize(&request)
        })
        .await
        .map_err(|e| PipelineError::Worker(e.to_string()))?
    }

    /// Normalize one file on the calling thread.
    pub fn normalize_blocking(
        &self,
        request: &NormalizeRequest,
    ) -> Result<NormalizeOutcome, PipelineError> {
        let _guard = self.slot.try_acquire()?;
        self.normalizer.normalize(request)
    }

    /// Normalize a batch of files in parallel under a single slot claim.
    ///
    /// The outer `Err` means the slot was busy and nothing ran. Each inner
    /// result is independent: one missing file does not stop the others.
    /// Results come back in request order. A file requested more than once
    /// is only processed for its first request; the repeats get
    /// [`PipelineError::DuplicatePath`].
    pub fn normalize_many(
        &self,
        requests: &[NormalizeRequest],
    ) -> Result<Vec<Result<NormalizeOutcome, PipelineError>>, PipelineError> {
        let _guard = self.slot.try_acquire()?;
        info!("normalizing {} files", requests.len());

        let first_seen = first_occurrences(requests);
        Ok(requests
            .par_iter()
            .zip(first_seen.par_iter())
            .map(|(request, &first)| {
                if first {
                    self.normalizer.normalize(request)
                } else {
                    Err(PipelineError::DuplicatePath(request.path.clone()))
                }
            })
            .collect())
    }
}

/// Marks the first request for each file, comparing canonical paths so
/// `a.jpg` and `./a.jpg` count as the same file.
fn first_occurrences(requests: &[NormalizeRequest]) -> Vec<bool> {
    let mut seen = HashSet::new();
    requests
        .iter()
        .map(|request| {
            let key = std::fs::canonicalize(&request.path).unwrap_or_else(|_| request.path.clone());
            seen.insert(key)
        })
        .collect()
}
