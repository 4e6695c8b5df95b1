//! Inference session: one loaded model, its decode context, sampler
//! chain, and working batch. One session is one logical owner of the
//! native handles; `&mut self` on every decode operation is what
//! serializes access.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use llama_rs::{LlamaBatch, LlamaContext, LlamaModel, SamplerChain, TokenCodec};

use crate::error::{LlamaError, Result};

mod text;
mod utf8;
mod vision;

pub use vision::VisionResponse;

use utf8::PendingUtf8;

/// Working batch capacity. Prompt submissions larger than this fail the
/// call; generation resubmits one token at a time.
const BATCH_CAPACITY: usize = 512;

/// Sampler chain settings. The seed is fixed so identical prompt+image
/// pairs reproduce.
const TEMPERATURE: f32 = 0.4;
const SEED: u32 = 1234;

/// Why a completion stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    /// The model produced an end-of-generation token.
    EndOfGeneration,
    /// The position counter reached the configured generation limit.
    Limit,
    /// The stop handle was flipped between decode steps.
    Cancelled,
}

/// Output of one decode step.
#[derive(Debug, Clone)]
pub struct StepOutput {
    /// UTF-8 text flushed by this step. Empty while a multi-byte
    /// codepoint is still split across tokens.
    pub text: String,
    /// Set on the terminal step.
    pub finished: Option<FinishReason>,
}

/// Knobs fixed at session construction.
#[derive(Debug, Clone)]
pub struct SessionParams {
    /// `false` pins every layer to the CPU (constrained-hardware profile).
    pub offload_gpu: bool,
    /// Maximum sequence length the context allocates KV space for.
    pub n_ctx: u32,
    /// Position ceiling for plain text completion (`n_cur` limit).
    pub n_len: i32,
}

impl Default for SessionParams {
    fn default() -> Self {
        let n_ctx = std::env::var("DOGCARE_N_CTX")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(2048);
        let n_len = std::env::var("DOGCARE_N_LEN")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(1024);
        Self {
            offload_gpu: true,
            n_ctx,
            n_len,
        }
    }
}

/// One loaded model + decode context + sampler + working batch.
pub struct InferenceSession {
    // Field order is teardown order: sampler and batch before the
    // context, the context before the weights.
    sampling: SamplerChain,
    batch: LlamaBatch,
    context: LlamaContext,
    model: Arc<LlamaModel>,

    pending: PendingUtf8,
    n_len: i32,
    n_cur: i32,
    n_decode: i32,
    is_done: bool,
    stop_flag: Arc<AtomicBool>,
}

impl InferenceSession {
    /// Load weights from `path` and allocate the session's native
    /// resources. Acquisition is all-or-nothing; any failure drops
    /// whatever was already acquired.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::create_with(path, SessionParams::default())
    }

    pub fn create_with<P: AsRef<Path>>(path: P, params: SessionParams) -> Result<Self> {
        let path = path.as_ref();
        let path_str = path.to_str().ok_or_else(|| {
            LlamaError::CouldNotInitializeContext("model path is not valid UTF-8".into())
        })?;

        let model = Arc::new(
            LlamaModel::load_from_file(path_str, params.offload_gpu)
                .map_err(LlamaError::CouldNotInitializeContext)?,
        );
        let context = LlamaContext::new(&model, params.n_ctx)
            .map_err(LlamaError::CouldNotInitializeContext)?;
        let sampling = SamplerChain::new(TEMPERATURE, SEED)
            .map_err(LlamaError::CouldNotInitializeContext)?;

        println!(
            "🧠 [session] loaded {} (n_ctx={})",
            model.description().unwrap_or_else(|| path_str.to_string()),
            params.n_ctx,
        );

        Ok(Self {
            sampling,
            batch: LlamaBatch::new(BATCH_CAPACITY),
            context,
            model,
            pending: PendingUtf8::default(),
            n_len: params.n_len,
            n_cur: 0,
            n_decode: 0,
            is_done: false,
            stop_flag: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Shared handle on the loaded weights; the projector is constructed
    /// against this.
    pub fn model(&self) -> &Arc<LlamaModel> {
        &self.model
    }

    /// Model description string for status UIs.
    pub fn model_info(&self) -> String {
        self.model.description().unwrap_or_default()
    }

    pub fn is_done(&self) -> bool {
        self.is_done
    }

    /// Tokens successfully decoded since the last reset.
    pub fn n_decode(&self) -> i32 {
        self.n_decode
    }

    /// Next sequence position to write.
    pub fn n_cur(&self) -> i32 {
        self.n_cur
    }

    /// Handle you can keep and flip to cancel generation between decode
    /// steps (`store(true)`).
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.stop_flag.clone()
    }

    /// Reset all per-sequence state: KV cache, batch, pending bytes,
    /// position counters. Required after a mid-stream evaluation failure.
    pub fn clear(&mut self) {
        self.context.clear_memory();
        self.batch.clear();
        self.pending.clear();
        self.n_cur = 0;
        self.n_decode = 0;
        self.is_done = false;
    }

    pub(crate) fn codec(&self) -> TokenCodec<'_> {
        TokenCodec::new(self.model.as_ref())
    }

    pub(crate) fn clear_stop(&self) {
        self.stop_flag.store(false, Ordering::Relaxed);
    }

    pub(crate) fn stop_requested(&self) -> bool {
        self.stop_flag.load(Ordering::Relaxed)
    }
}

// SAFETY: every native handle in here is confined behind `&mut self`; the
// session may move between threads (registry loader -> owner) but is never
// used from two at once.
unsafe impl Send for InferenceSession {}
