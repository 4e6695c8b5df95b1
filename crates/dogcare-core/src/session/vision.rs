// Vision completion: images become bitmaps, the marked-up prompt and
// bitmaps jointly tokenize into ordered chunks (text / image / text),
// chunks evaluate in order through the projector, then a bounded decode
// loop samples the reply.

use llama_rs::mtmd;

use crate::error::{LlamaError, Result};
use crate::projector::MultimodalProjector;

use super::{FinishReason, InferenceSession};

/// One vision completion's output. Immutable once returned.
#[derive(Debug, Clone)]
pub struct VisionResponse {
    pub text: String,
    /// Raw little-endian f32 bytes of the first image chunk's projector
    /// output: `chunk_tokens * n_embd_inp * 4` bytes. The width is the
    /// model's input embedding size, not its hidden size; deepstack
    /// models stack several hidden-size rows per position.
    pub embedding: Option<Vec<u8>>,
}

impl InferenceSession {
    /// Answer `prompt` about `images` (raw encoded bytes, one marker per
    /// image). Always starts a fresh sequence: the KV cache, batch,
    /// pending bytes, and decode counter reset before evaluation.
    ///
    /// The projector must have been created against this session's model.
    pub fn generate_vision_response(
        &mut self,
        prompt: &str,
        images: &[Vec<u8>],
        projector: &MultimodalProjector,
        max_tokens: i32,
    ) -> Result<VisionResponse> {
        if images.is_empty() {
            return Err(LlamaError::InvalidVisionInput("no image data supplied".into()));
        }
        self.clear_stop();

        let mm = projector.context();
        let mut bitmaps = Vec::with_capacity(images.len());
        for data in images {
            let bitmap = mm
                .bitmap_from_bytes(data)
                .map_err(LlamaError::InvalidVisionInput)?;
            bitmaps.push(bitmap);
        }

        let marked_prompt = ensure_marker(prompt, mtmd::default_marker(), images.len());
        println!("🖼️ [vision] prompt: {marked_prompt:?}");

        let chunks = mm
            .tokenize(&marked_prompt, &bitmaps)
            .map_err(LlamaError::FailedToTokenizeVisionPrompt)?;

        // Fresh sequence for every vision request.
        self.clear();

        let embd_width = self.model.n_embd_inp();
        let chunk_count = chunks.len();
        let mut n_past: i32 = 0;
        let mut embedding: Option<Vec<u8>> = None;

        for index in 0..chunk_count {
            let Some(chunk) = chunks.get(index) else {
                continue;
            };
            let is_last = index + 1 == chunk_count;
            n_past = mm
                .eval_chunk(&mut self.context, chunk, n_past, is_last)
                .map_err(LlamaError::FailedToEvaluateVisionPrompt)?;

            // First image chunk only.
            if chunk.is_image() && embedding.is_none() {
                embedding = mm.output_embedding(chunk.n_tokens() * embd_width);
            }
        }
        self.n_cur = n_past;

        let mut generated = String::new();
        let mut tokens_generated: i32 = 0;
        let finish = loop {
            if tokens_generated >= max_tokens {
                break FinishReason::Limit;
            }
            if self.stop_requested() {
                break FinishReason::Cancelled;
            }

            let token = self.sampling.sample(&self.context, -1);
            if self.model.is_eog(token) {
                break FinishReason::EndOfGeneration;
            }

            let piece = self
                .codec()
                .token_to_piece(token)
                .map_err(LlamaError::FailedToEvaluateVisionPrompt)?;
            generated.push_str(&self.pending.push(&piece));

            self.batch.clear();
            self.batch
                .add(token, n_past, &[0], true)
                .map_err(LlamaError::FailedToEvaluateVisionPrompt)?;

            n_past += 1;
            self.n_cur = n_past;
            self.n_decode += 1;

            self.context
                .decode(&self.batch)
                .map_err(LlamaError::FailedToEvaluateVisionPrompt)?;

            tokens_generated += 1;
        };
        generated.push_str(&self.pending.flush());

        println!("🏁 [vision] finished: {finish:?} ({tokens_generated} tokens)");

        Ok(VisionResponse {
            text: generated.trim().to_string(),
            embedding,
        })
    }
}

/// Ensure `prompt` carries at least `count` media markers, appending the
/// missing ones on their own trailing lines. Extra markers are left
/// alone; calling again with the same count changes nothing.
fn ensure_marker(prompt: &str, marker: &str, count: usize) -> String {
    if count == 0 {
        return prompt.to_string();
    }
    let existing = prompt.matches(marker).count();
    if existing >= count {
        return prompt.to_string();
    }

    let mut updated = prompt.to_string();
    for _ in existing..count {
        if !updated.ends_with('\n') {
            updated.push('\n');
        }
        updated.push_str(marker);
    }
    updated
}

#[cfg(test)]
mod tests {
    use super::ensure_marker;

    const MARKER: &str = "<__media__>";

    #[test]
    fn appends_one_marker_per_missing_image() {
        let out = ensure_marker("what breed is this dog?", MARKER, 2);
        assert_eq!(out.matches(MARKER).count(), 2);
        assert_eq!(out, format!("what breed is this dog?\n{MARKER}\n{MARKER}"));
    }

    #[test]
    fn each_appended_marker_sits_on_its_own_line() {
        let out = ensure_marker("prompt\n", MARKER, 1);
        assert_eq!(out, format!("prompt\n{MARKER}"));
    }

    #[test]
    fn idempotent_when_markers_already_present() {
        let prompt = format!("look at this:\n{MARKER}");
        assert_eq!(ensure_marker(&prompt, MARKER, 1), prompt);
    }

    #[test]
    fn never_removes_extra_markers() {
        let prompt = format!("{MARKER} and {MARKER}");
        assert_eq!(ensure_marker(&prompt, MARKER, 1), prompt);
    }

    #[test]
    fn counts_only_missing_markers() {
        let prompt = format!("one here: {MARKER}");
        let out = ensure_marker(&prompt, MARKER, 3);
        assert_eq!(out.matches(MARKER).count(), 3);
    }

    #[test]
    fn zero_images_leaves_prompt_untouched() {
        assert_eq!(ensure_marker("hello", MARKER, 0), "hello");
    }
}
