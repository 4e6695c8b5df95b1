// llama-rs/src/mtmd.rs
//
// Multimodal projector wrappers: the secondary native context that turns
// image bytes into embeddings the language model can evaluate, plus the
// bitmap and chunk types that flow through it.

use std::ffi::{CStr, CString};
use std::marker::PhantomData;
use std::ptr::NonNull;
use std::sync::Arc;

use once_cell::sync::Lazy;

use llama_cpp_sys_2::{
    mtmd_bitmap, mtmd_bitmap_free, mtmd_context, mtmd_context_params_default, mtmd_default_marker,
    mtmd_free, mtmd_get_output_embd, mtmd_helper_bitmap_init_from_buf,
    mtmd_helper_eval_chunk_single, mtmd_init_from_file, mtmd_input_chunk,
    mtmd_input_chunk_get_n_tokens, mtmd_input_chunk_get_type, mtmd_input_chunks,
    mtmd_input_chunks_free, mtmd_input_chunks_get, mtmd_input_chunks_init,
    mtmd_input_chunks_size, mtmd_input_text, mtmd_tokenize,
};

use crate::context::LlamaContext;
use crate::ffi;
use crate::model::LlamaModel;

/// Media-marker placeholder string defined by the native library, one
/// occurrence per image in a vision prompt.
pub fn default_marker() -> &'static str {
    static MARKER: Lazy<String> = Lazy::new(|| {
        unsafe { CStr::from_ptr(mtmd_default_marker()) }
            .to_string_lossy()
            .into_owned()
    });
    &MARKER
}

/// Owned `mtmd_context*`: the projector.
///
/// Holds a shared handle on the base model, so the projector can never
/// outlive the weights it reads from.
pub struct MtmdContext {
    ctx: NonNull<mtmd_context>,
    _model: Arc<LlamaModel>,
}

impl MtmdContext {
    /// Load a projector (`mmproj` GGUF) against an already-loaded model.
    pub fn init_from_file(mmproj_path: &str, model: Arc<LlamaModel>) -> Result<Self, String> {
        let c_path =
            CString::new(mmproj_path).map_err(|_| "mmproj path contains NUL".to_string())?;

        let mut params = unsafe { mtmd_context_params_default() };
        params.use_gpu = true;
        params.print_timings = false;
        params.media_marker = unsafe { mtmd_default_marker() };
        params.n_threads = num_cpus::get().max(2) as i32;

        ffi::trace(&format!("[FFI] mtmd_init_from_file: {mmproj_path}"));
        let ptr = unsafe { mtmd_init_from_file(c_path.as_ptr(), model.as_ptr(), params) };
        NonNull::new(ptr)
            .map(|ctx| Self { ctx, _model: model })
            .ok_or_else(|| format!("could not load projector at {mmproj_path}"))
    }

    #[inline]
    pub fn as_ptr(&self) -> *mut mtmd_context {
        self.ctx.as_ptr()
    }

    /// Decode raw encoded image bytes (PNG/JPEG/...) into a bitmap.
    pub fn bitmap_from_bytes(&self, data: &[u8]) -> Result<MtmdBitmap, String> {
        let ptr =
            unsafe { mtmd_helper_bitmap_init_from_buf(self.as_ptr(), data.as_ptr(), data.len()) };
        NonNull::new(ptr)
            .map(|raw| MtmdBitmap { raw })
            .ok_or_else(|| "could not decode image bytes into a bitmap".to_string())
    }

    /// Joint text+image tokenization. The prompt must already carry one
    /// media marker per bitmap; the result is an ordered chunk sequence.
    pub fn tokenize(&self, prompt: &str, bitmaps: &[MtmdBitmap]) -> Result<MtmdChunks, String> {
        let chunks = MtmdChunks::new()?;
        let c_prompt = CString::new(prompt).map_err(|_| "prompt contains NUL".to_string())?;
        let text = mtmd_input_text {
            text: c_prompt.as_ptr(),
            add_special: true,
            parse_special: true,
        };

        let mut bitmap_ptrs: Vec<*const mtmd_bitmap> = bitmaps
            .iter()
            .map(|b| b.raw.as_ptr() as *const mtmd_bitmap)
            .collect();

        let rc = unsafe {
            mtmd_tokenize(
                self.as_ptr(),
                chunks.raw.as_ptr(),
                &text,
                bitmap_ptrs.as_mut_ptr(),
                bitmap_ptrs.len(),
            )
        };
        if rc != 0 {
            return Err(format!("mtmd_tokenize failed with code {rc}"));
        }
        Ok(chunks)
    }

    /// Evaluate one chunk against `lctx`, returning the advanced position.
    pub fn eval_chunk(
        &self,
        lctx: &mut LlamaContext,
        chunk: MtmdChunk<'_>,
        n_past: i32,
        logits_last: bool,
    ) -> Result<i32, String> {
        let mut new_n_past: i32 = n_past;
        let n_batch = lctx.n_batch() as i32;
        let rc = unsafe {
            mtmd_helper_eval_chunk_single(
                self.as_ptr(),
                lctx.as_ptr(),
                chunk.raw,
                n_past,
                0,
                n_batch,
                logits_last,
                &mut new_n_past,
            )
        };
        if rc != 0 {
            return Err(format!(
                "mtmd_helper_eval_chunk_single failed with code {rc}"
            ));
        }
        Ok(new_n_past)
    }

    /// Copy of the projector's most recent output tensor as little-endian
    /// f32 bytes. `None` until a media chunk has been encoded.
    pub fn output_embedding(&self, n_floats: usize) -> Option<Vec<u8>> {
        let ptr = unsafe { mtmd_get_output_embd(self.as_ptr()) };
        if ptr.is_null() {
            return None;
        }
        let floats = unsafe { std::slice::from_raw_parts(ptr, n_floats) };
        let mut bytes = Vec::with_capacity(n_floats * 4);
        for f in floats {
            bytes.extend_from_slice(&f.to_le_bytes());
        }
        Some(bytes)
    }
}

impl Drop for MtmdContext {
    fn drop(&mut self) {
        ffi::trace("[FFI] mtmd_free()");
        unsafe { mtmd_free(self.ctx.as_ptr()) };
    }
}

// SAFETY: the projector has no thread affinity; the loading thread hands
// it to the owner and exclusive access is enforced from there.
unsafe impl Send for MtmdContext {}

/// Owned `mtmd_bitmap*`: one decoded image.
pub struct MtmdBitmap {
    raw: NonNull<mtmd_bitmap>,
}

impl Drop for MtmdBitmap {
    fn drop(&mut self) {
        unsafe { mtmd_bitmap_free(self.raw.as_ptr()) };
    }
}

/// Owned `mtmd_input_chunks*`: the ordered output of joint tokenization.
pub struct MtmdChunks {
    raw: NonNull<mtmd_input_chunks>,
}

impl MtmdChunks {
    fn new() -> Result<Self, String> {
        NonNull::new(unsafe { mtmd_input_chunks_init() })
            .map(|raw| Self { raw })
            .ok_or_else(|| "mtmd_input_chunks_init returned null".to_string())
    }

    pub fn len(&self) -> usize {
        unsafe { mtmd_input_chunks_size(self.raw.as_ptr()) }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<MtmdChunk<'_>> {
        let ptr = unsafe { mtmd_input_chunks_get(self.raw.as_ptr(), index) };
        if ptr.is_null() {
            None
        } else {
            Some(MtmdChunk {
                raw: ptr,
                _owner: PhantomData,
            })
        }
    }
}

impl Drop for MtmdChunks {
    fn drop(&mut self) {
        unsafe { mtmd_input_chunks_free(self.raw.as_ptr()) };
    }
}

/// Borrowed view of one tokenized chunk, either a text span or one image.
#[derive(Clone, Copy)]
pub struct MtmdChunk<'a> {
    raw: *const mtmd_input_chunk,
    _owner: PhantomData<&'a MtmdChunks>,
}

impl MtmdChunk<'_> {
    /// mtmd_input_chunk_type: 0 = text, 1 = image, 2 = audio.
    pub fn is_image(&self) -> bool {
        (unsafe { mtmd_input_chunk_get_type(self.raw) }) as u32 == 1
    }

    /// Positions this chunk occupies in the sequence.
    pub fn n_tokens(&self) -> usize {
        unsafe { mtmd_input_chunk_get_n_tokens(self.raw) }
    }
}
