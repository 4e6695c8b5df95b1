//! On-device vision-language inference core for the dog-care companion
//! app.
//!
//! The UI and identity layers live elsewhere; this crate owns the loaded
//! llama.cpp session, the multimodal projector, and the registry that
//! resolves model files and reports per-slot load status.

pub mod error;
pub mod projector;
pub mod registry;
pub mod session;

pub use error::{LlamaError, Result};
pub use projector::MultimodalProjector;
pub use registry::{Descriptor, LoadMode, LoadState, ModelRegistry, Status};
pub use session::{FinishReason, InferenceSession, SessionParams, StepOutput, VisionResponse};
