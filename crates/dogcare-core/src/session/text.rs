// Plain text completion: prompt prefill in one batch, then an
// incremental sample → evaluate loop, one token per step.

use crate::error::{LlamaError, Result};

use super::{FinishReason, InferenceSession, StepOutput};

impl InferenceSession {
    /// Tokenize and evaluate the prompt. Only the final prompt token
    /// requests logits; `n_cur` lands on the first generation position.
    ///
    /// A decode failure fails the call: on this path and the vision path
    /// alike, native errors propagate instead of being logged away.
    pub fn start_completion(&mut self, prompt: &str) -> Result<()> {
        println!("🧠 [completion] prompt: {prompt:?}");
        self.clear_stop();
        self.is_done = false;
        self.pending.clear();

        let tokens = self
            .codec()
            .tokenize(prompt, true)
            .map_err(LlamaError::FailedToEvaluatePrompt)?;

        let n_ctx = self.context.n_ctx() as usize;
        let n_kv_req = tokens.len() + (self.n_len as usize).saturating_sub(tokens.len());
        if n_kv_req > n_ctx {
            // Attempted anyway; the decode below will tell us if the KV
            // cache really is too small.
            eprintln!("⚠️ [completion] n_kv_req ({n_kv_req}) > n_ctx ({n_ctx})");
        }

        self.batch.clear();
        let last = tokens.len().saturating_sub(1);
        for (i, token) in tokens.iter().enumerate() {
            self.batch
                .add(*token, i as i32, &[0], i == last)
                .map_err(LlamaError::FailedToEvaluatePrompt)?;
        }

        self.context
            .decode(&self.batch)
            .map_err(LlamaError::FailedToEvaluatePrompt)?;

        self.n_cur = self.batch.len() as i32;
        Ok(())
    }

    /// One decode step: sample the next token, then either finish or
    /// evaluate it at the current position.
    pub fn completion_step(&mut self) -> Result<StepOutput> {
        let token = self.sampling.sample(&self.context, self.batch.len() as i32 - 1);

        if self.stop_requested() {
            self.is_done = true;
            return Ok(StepOutput {
                text: self.pending.flush(),
                finished: Some(FinishReason::Cancelled),
            });
        }

        let eog = self.model.is_eog(token);
        if eog || self.n_cur == self.n_len {
            self.is_done = true;
            let reason = if eog {
                FinishReason::EndOfGeneration
            } else {
                FinishReason::Limit
            };
            return Ok(StepOutput {
                text: self.pending.flush(),
                finished: Some(reason),
            });
        }

        let piece = self
            .codec()
            .token_to_piece(token)
            .map_err(LlamaError::FailedToEvaluatePrompt)?;
        let text = self.pending.push(&piece);

        self.batch.clear();
        self.batch
            .add(token, self.n_cur, &[0], true)
            .map_err(LlamaError::FailedToEvaluatePrompt)?;

        self.n_decode += 1;
        self.n_cur += 1;

        self.context
            .decode(&self.batch)
            .map_err(LlamaError::FailedToEvaluatePrompt)?;

        Ok(StepOutput {
            text,
            finished: None,
        })
    }

    /// Full completion, streaming each UTF-8 delta into `on_delta`.
    /// Returns the whole trimmed output as well.
    pub fn complete_text_stream<F>(&mut self, prompt: &str, mut on_delta: F) -> Result<String>
    where
        F: FnMut(&str),
    {
        self.start_completion(prompt)?;

        let mut out = String::new();
        loop {
            let step = self.completion_step()?;
            if !step.text.is_empty() {
                on_delta(&step.text);
                out.push_str(&step.text);
            }
            if let Some(reason) = step.finished {
                println!(
                    "🏁 [completion] finished: {reason:?} ({} tokens decoded)",
                    self.n_decode
                );
                break;
            }
        }
        Ok(out.trim().to_string())
    }

    /// Non-streaming convenience wrapper.
    pub fn complete_text(&mut self, prompt: &str) -> Result<String> {
        self.complete_text_stream(prompt, |_| {})
    }
}
