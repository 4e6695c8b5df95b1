// llama-rs/src/batch.rs
//
// Thin RAII wrapper over `llama_batch`.
// - Alloc via `llama_batch_init` (token mode, single sequence).
// - Reused across decode calls with `clear()`; drop frees the storage.

use llama_cpp_sys_2::{llama_batch, llama_batch_free, llama_batch_init};

use crate::token::LlamaToken;

/// Fixed-capacity buffer of pending token evaluations.
pub struct LlamaBatch {
    raw: llama_batch,
    capacity: usize,
}

impl LlamaBatch {
    /// Create a token-based batch holding up to `capacity` records.
    /// `embd = 0` (token mode), `n_seq_max = 1` (single sequence).
    pub fn new(capacity: usize) -> Self {
        let raw = unsafe { llama_batch_init(capacity as i32, 0, 1) };
        Self { raw, capacity }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.raw.n_tokens as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.raw.n_tokens == 0
    }

    /// Reset to empty without releasing storage.
    pub fn clear(&mut self) {
        self.raw.n_tokens = 0;
    }

    /// Append one record `{token, pos, seq_ids, want_logits}`.
    ///
    /// Fails once the batch is full (callers clear and resubmit in chunks
    /// no larger than `capacity`) and when more than one sequence id is
    /// supplied, since the storage is allocated single-sequence.
    pub fn add(
        &mut self,
        token: LlamaToken,
        pos: i32,
        seq_ids: &[i32],
        want_logits: bool,
    ) -> Result<(), String> {
        let index = self.len();
        if index >= self.capacity {
            return Err(format!(
                "batch full: {index} records, capacity {}",
                self.capacity
            ));
        }
        // n_seq_max = 1 at init; the native seq_id slot holds exactly one
        // entry, so extra ids must be rejected before the write below.
        if seq_ids.len() > 1 {
            return Err(format!(
                "batch was initialized for one sequence, got {} seq ids",
                seq_ids.len()
            ));
        }

        unsafe {
            *self.raw.token.add(index) = token.0;
            *self.raw.pos.add(index) = pos;
            *self.raw.n_seq_id.add(index) = seq_ids.len() as i32;
            let seq_slot = *self.raw.seq_id.add(index);
            for (i, &seq) in seq_ids.iter().enumerate() {
                *seq_slot.add(i) = seq;
            }
            *self.raw.logits.add(index) = want_logits as i8;
        }

        self.raw.n_tokens = (index + 1) as i32;
        Ok(())
    }

    /// Ensure exactly the last record requests logits. Used on the prompt
    /// path, where every token is added with `want_logits = false` first.
    pub fn mark_last_for_logits(&mut self) {
        let n = self.len();
        if n == 0 {
            return;
        }
        unsafe {
            for i in 0..n {
                *self.raw.logits.add(i) = 0;
            }
            *self.raw.logits.add(n - 1) = 1;
        }
    }

    /// Whether the record at `index` requests logits.
    pub fn wants_logits(&self, index: usize) -> bool {
        assert!(index < self.len(), "index {index} >= len {}", self.len());
        unsafe { *self.raw.logits.add(index) != 0 }
    }

    /// By-value copy of the raw struct for `llama_decode`.
    #[inline]
    pub fn raw(&self) -> llama_batch {
        self.raw
    }
}

impl Drop for LlamaBatch {
    fn drop(&mut self) {
        unsafe { llama_batch_free(self.raw) };
    }
}
