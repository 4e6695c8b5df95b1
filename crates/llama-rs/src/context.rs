// llama-rs/src/context.rs
//
// Decode context: KV cache, thread pool config, all decode-time mutation.
// The model itself stays immutable and shared once loaded.

use std::ptr::NonNull;

use llama_cpp_sys_2::{
    llama_context, llama_context_default_params, llama_decode, llama_free, llama_get_memory,
    llama_init_from_model, llama_memory_clear, llama_n_batch, llama_n_ctx,
};

use crate::batch::LlamaBatch;
use crate::ffi;
use crate::model::LlamaModel;

/// Decode threads for `available` logical cores: leave two cores for the
/// rest of the app, stay within [1, 8].
pub fn decode_thread_count(available: usize) -> usize {
    available.saturating_sub(2).clamp(1, 8)
}

/// Owned `llama_context*`. Must not outlive the model it was created
/// from; owners keep the model handle alive alongside (and declared
/// after) the context.
pub struct LlamaContext {
    ctx: NonNull<llama_context>,
}

impl LlamaContext {
    /// Allocate a context with a `n_ctx`-token window. Batch threads
    /// match decode threads.
    pub fn new(model: &LlamaModel, n_ctx: u32) -> Result<Self, String> {
        let n_threads = decode_thread_count(num_cpus::get()) as i32;
        ffi::trace(&format!(
            "[FFI] llama_init_from_model (n_ctx={n_ctx}, n_threads={n_threads})"
        ));

        let mut params = unsafe { llama_context_default_params() };
        params.n_ctx = n_ctx;
        params.n_threads = n_threads;
        params.n_threads_batch = n_threads;

        let ptr = unsafe { llama_init_from_model(model.as_ptr(), params) };
        NonNull::new(ptr)
            .map(|ctx| Self { ctx })
            .ok_or_else(|| "llama_init_from_model returned null".to_string())
    }

    #[inline]
    pub fn as_ptr(&self) -> *mut llama_context {
        self.ctx.as_ptr()
    }

    /// Configured maximum sequence length.
    pub fn n_ctx(&self) -> u32 {
        unsafe { llama_n_ctx(self.as_ptr()) }
    }

    /// Native batch size, needed by the chunked projector evaluation.
    pub fn n_batch(&self) -> u32 {
        unsafe { llama_n_batch(self.as_ptr()) }
    }

    /// Submit a prepared batch for one evaluation step.
    pub fn decode(&mut self, batch: &LlamaBatch) -> Result<(), String> {
        let rc = unsafe { llama_decode(self.as_ptr(), batch.raw()) };
        if rc != 0 {
            Err(format!("llama_decode failed with code {rc}"))
        } else {
            Ok(())
        }
    }

    /// Wipe the KV cache so the next sequence starts from scratch.
    pub fn clear_memory(&mut self) {
        unsafe {
            let mem = llama_get_memory(self.as_ptr());
            llama_memory_clear(mem, true);
        }
    }
}

impl Drop for LlamaContext {
    fn drop(&mut self) {
        ffi::trace("[FFI] llama_free(context)");
        unsafe { llama_free(self.ctx.as_ptr()) };
    }
}

#[cfg(test)]
mod tests {
    use super::decode_thread_count;

    #[test]
    fn thread_count_stays_within_bounds() {
        assert_eq!(decode_thread_count(1), 1);
        assert_eq!(decode_thread_count(2), 1);
        assert_eq!(decode_thread_count(4), 2);
        assert_eq!(decode_thread_count(10), 8);
        assert_eq!(decode_thread_count(64), 8);
    }
}
