//! Batched iteration over large result sets.

use thiserror::Error;

/// Anything that can return a page of results by offset and limit.
pub trait BatchSource {
    type Item;
    type Error;

    /// Fetch at most `limit` items starting at `offset`.
    fn fetch(&mut self, offset: usize, limit: usize) -> Result<Vec<Self::Item>, Self::Error>;
}

impl<S: BatchSource + ?Sized> BatchSource for &mut S {
    type Item = S::Item;
    type Error = S::Error;

    fn fetch(&mut self, offset: usize, limit: usize) -> Result<Vec<Self::Item>, Self::Error> {
        (**self).fetch(offset, limit)
    }
}

/// Errors from batched iteration.
#[derive(Debug, Error)]
pub enum BatchError<E> {
    #[error("batch size must be a positive integer, got {0}")]
    InvalidBatchSize(usize),

    #[error("batch fetch failed: {0}")]
    Source(E),
}

/// Iterates over a [`BatchSource`] one batch at a time.
///
/// Each call to `next` issues one fetch. A batch shorter than the batch size
/// is taken to be the last one, so no further query is made after it; a
/// full batch may be followed by an empty one, which ends the iteration
/// without being yielded.
pub struct BatchIterator<S> {
    source: S,
    batch_size: usize,
    /// Zero-based index of the batch the next fetch will return.
    next_batch: usize,
    retrieved: usize,
    exhausted: bool,
}

impl<S: BatchSource> BatchIterator<S> {
    /// Create an iterator fetching `batch_size` items at a time.
    pub fn new(source: S, batch_size: usize) -> Result<Self, BatchError<S::Error>> {
        validate(batch_size)?;
        Ok(Self {
            source,
            batch_size,
            next_batch: 0,
            retrieved: 0,
            exhausted: false,
        })
    }

    /// Number of items requested per batch.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Change the batch size. Takes effect from the next fetch.
    pub fn set_batch_size(&mut self, batch_size: usize) -> Result<(), BatchError<S::Error>> {
        validate(batch_size)?;
        self.batch_size = batch_size;
        Ok(())
    }

    /// Total items yielded so far.
    pub fn retrieved_count(&self) -> usize {
        self.retrieved
    }

    /// Zero-based index of the last batch yielded.
    pub fn batch_index(&self) -> Option<usize> {
        self.next_batch.checked_sub(1)
    }

    /// Start over from the first batch.
    pub fn rewind(&mut self) {
        self.next_batch = 0;
        self.retrieved = 0;
        self.exhausted = false;
    }

    /// Give back the source.
    pub fn into_inner(self) -> S {
        self.source
    }
}

impl<S: BatchSource> Iterator for BatchIterator<S> {
    type Item = Result<Vec<S::Item>, BatchError<S::Error>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.exhausted {
            return None;
        }

        let batch = match self.source.fetch(self.retrieved, self.batch_size) {
            Ok(batch) => batch,
            Err(e) => {
                self.exhausted = true;
                return Some(Err(BatchError::Source(e)));
            }
        };

        if batch.is_empty() {
            self.exhausted = true;
            return None;
        }

        self.exhausted = batch.len() < self.batch_size;
        self.retrieved += batch.len();
        self.next_batch += 1;
        Some(Ok(batch))
    }
}

fn validate<E>(batch_size: usize) -> Result<(), BatchError<E>> {
    if batch_size == 0 {
        return Err(BatchError::InvalidBatchSize(batch_size));
    }
    Ok(())
}
