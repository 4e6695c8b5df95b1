//! Safe wrappers over the raw `llama-cpp-sys-2` bindings.
//!
//! All `unsafe` stays inside this crate. Every native handle is owned by
//! exactly one RAII type whose `Drop` releases it; callers never see raw
//! pointers except through the `as_ptr` escape hatches the wrappers
//! themselves use to talk to each other.

pub mod batch;
pub mod context;
pub mod ffi;
pub mod model;
pub mod mtmd;
pub mod sampling;
pub mod token;
pub mod vocab;

pub use batch::LlamaBatch;
pub use context::LlamaContext;
pub use model::LlamaModel;
pub use sampling::SamplerChain;
pub use token::LlamaToken;
pub use vocab::TokenCodec;
