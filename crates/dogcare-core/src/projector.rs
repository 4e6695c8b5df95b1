//! Multimodal projector: the secondary native context that turns image
//! bytes into embeddings the base model can evaluate.

use std::sync::Arc;

use llama_rs::mtmd::MtmdContext;
use llama_rs::LlamaModel;

use crate::error::{LlamaError, Result};

/// Owned projector context. The context keeps a shared handle on the
/// base model, so the projector cannot outlive the weights it reads.
pub struct MultimodalProjector {
    context: MtmdContext,
}

impl MultimodalProjector {
    /// Load the projector file. This blocks for the full native load;
    /// callers that must stay responsive (the registry's owner) run the
    /// load on their own loader thread, and the finished projector is
    /// `Send`.
    pub fn create(mmproj_path: &str, model: Arc<LlamaModel>) -> Result<Self> {
        let context = MtmdContext::init_from_file(mmproj_path, model)
            .map_err(LlamaError::CouldNotInitializeProjector)?;
        Ok(Self { context })
    }

    #[inline]
    pub(crate) fn context(&self) -> &MtmdContext {
        &self.context
    }
}
