// llama-rs/src/model.rs

use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr::NonNull;

use llama_cpp_sys_2::{
    llama_model, llama_model_default_params, llama_model_desc, llama_model_free,
    llama_model_get_vocab, llama_model_load_from_file, llama_model_n_embd,
    llama_model_n_embd_inp, llama_vocab, llama_vocab_is_eog,
};

use crate::ffi;
use crate::token::LlamaToken;

/// Owned `llama_model*`: the loaded weight set.
///
/// Exactly one owner; freed once on drop. A session's context and sampler
/// must be released before the model they were built against, which
/// callers get for free by declaring the model field last.
pub struct LlamaModel {
    model: NonNull<llama_model>,
}

impl LlamaModel {
    /// Load weights from a GGUF file.
    ///
    /// `offload_gpu = false` pins every layer to the CPU (constrained
    /// hardware profile); `true` offloads as many layers as the backend
    /// accepts.
    pub fn load_from_file(path: &str, offload_gpu: bool) -> Result<Self, String> {
        ffi::init_backend();

        let c_path = CString::new(path).map_err(|_| "model path contains NUL".to_string())?;
        let mut params = unsafe { llama_model_default_params() };
        params.n_gpu_layers = if offload_gpu { i32::MAX } else { 0 };

        ffi::trace(&format!("[FFI] llama_model_load_from_file: {path}"));
        let ptr = unsafe { llama_model_load_from_file(c_path.as_ptr(), params) };
        NonNull::new(ptr)
            .map(|model| Self { model })
            .ok_or_else(|| format!("could not load model at {path}"))
    }

    #[inline]
    pub fn as_ptr(&self) -> *mut llama_model {
        self.model.as_ptr()
    }

    #[inline]
    pub(crate) fn vocab_ptr(&self) -> *const llama_vocab {
        unsafe { llama_model_get_vocab(self.as_ptr()) }
    }

    /// Hidden size of the model.
    pub fn n_embd(&self) -> usize {
        unsafe { llama_model_n_embd(self.as_ptr()) as usize }
    }

    /// Input embedding width: floats per image token on the projector
    /// path. Deepstack models (Qwen3-VL) feed a multiple of [`n_embd`]
    /// here, so the two are not interchangeable for sizing projector
    /// output.
    ///
    /// [`n_embd`]: Self::n_embd
    pub fn n_embd_inp(&self) -> usize {
        unsafe { llama_model_n_embd_inp(self.as_ptr()) as usize }
    }

    /// Whether `token` ends generation for this vocabulary.
    pub fn is_eog(&self, token: LlamaToken) -> bool {
        unsafe { llama_vocab_is_eog(self.vocab_ptr(), token.0) }
    }

    /// Model description string (arch / size / quant), if available.
    pub fn description(&self) -> Option<String> {
        let mut buf = vec![0 as c_char; 256];
        let wrote = unsafe { llama_model_desc(self.as_ptr(), buf.as_mut_ptr(), buf.len()) };
        if wrote <= 0 {
            return None;
        }
        let s = unsafe { CStr::from_ptr(buf.as_ptr()) }
            .to_string_lossy()
            .into_owned();
        Some(s)
    }
}

impl Drop for LlamaModel {
    fn drop(&mut self) {
        ffi::trace("[FFI] llama_model_free()");
        unsafe { llama_model_free(self.model.as_ptr()) };
    }
}

// SAFETY: the weights are immutable after load; every mutating operation
// lives on LlamaContext. Sharing the model read-only across threads (the
// projector holds a second handle) is what llama.cpp expects.
unsafe impl Send for LlamaModel {}
unsafe impl Sync for LlamaModel {}
