// llama-rs/src/vocab.rs
//
// Text <-> token conversion. Two buffer-sizing contracts live here:
// tokenize over-allocates (a token never needs more slots than source
// bytes plus markers), token_to_piece probes small and retries with the
// exact size the native call reports.

use std::ffi::CString;
use std::os::raw::c_char;

use llama_cpp_sys_2::{llama_token_to_piece, llama_tokenize};

use crate::model::LlamaModel;
use crate::token::LlamaToken;

/// Borrowed view over a model's vocabulary.
pub struct TokenCodec<'a> {
    model: &'a LlamaModel,
}

impl<'a> TokenCodec<'a> {
    pub fn new(model: &'a LlamaModel) -> Self {
        Self { model }
    }

    /// Tokenize `text`, optionally prefixed with a beginning-of-sequence
    /// marker.
    pub fn tokenize(&self, text: &str, add_bos: bool) -> Result<Vec<LlamaToken>, String> {
        let utf8_len = text.len();
        let c_text = CString::new(text).map_err(|_| "prompt contains NUL".to_string())?;

        // Upper bound, not a tight one.
        let max_tokens = utf8_len + 1 + usize::from(add_bos);
        let mut buf = vec![0i32; max_tokens];

        let n = unsafe {
            llama_tokenize(
                self.model.vocab_ptr(),
                c_text.as_ptr(),
                utf8_len as i32,
                buf.as_mut_ptr(),
                max_tokens as i32,
                add_bos,
                false,
            )
        };
        if n < 0 {
            return Err(format!("llama_tokenize failed: {n}"));
        }

        buf.truncate(n as usize);
        Ok(buf.into_iter().map(LlamaToken).collect())
    }

    /// Raw bytes of one token's text fragment. No NUL terminator, and not
    /// necessarily valid UTF-8 on its own; multi-byte codepoints split
    /// across tokens.
    pub fn token_to_piece(&self, token: LlamaToken) -> Result<Vec<u8>, String> {
        let mut buf = vec![0 as c_char; 8];
        let mut n = unsafe {
            llama_token_to_piece(
                self.model.vocab_ptr(),
                token.0,
                buf.as_mut_ptr(),
                buf.len() as i32,
                0,
                false,
            )
        };

        if n < 0 {
            // Negative means "need exactly -n bytes"; retry once.
            buf = vec![0 as c_char; (-n) as usize];
            n = unsafe {
                llama_token_to_piece(
                    self.model.vocab_ptr(),
                    token.0,
                    buf.as_mut_ptr(),
                    buf.len() as i32,
                    0,
                    false,
                )
            };
            if n < 0 {
                return Err(format!("llama_token_to_piece failed after retry: {n}"));
            }
        }

        buf.truncate(n as usize);
        Ok(buf.into_iter().map(|c| c as u8).collect())
    }
}
