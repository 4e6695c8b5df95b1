use thiserror::Error;

/// Inference failure taxonomy.
///
/// The two `CouldNotInitialize*` variants are fatal to the resource being
/// constructed, nothing else. The per-call variants leave the session
/// alive; after `FailedToEvaluateVisionPrompt` the sequence state may be
/// mid-stream and wants an [`InferenceSession::clear`] before reuse.
///
/// [`InferenceSession::clear`]: crate::session::InferenceSession::clear
#[derive(Debug, Error)]
pub enum LlamaError {
    #[error("could not initialize the text model context: {0}")]
    CouldNotInitializeContext(String),

    #[error("could not initialize the multimodal projector: {0}")]
    CouldNotInitializeProjector(String),

    #[error("image data could not be processed: {0}")]
    InvalidVisionInput(String),

    #[error("failed to prepare the vision request: {0}")]
    FailedToTokenizeVisionPrompt(String),

    #[error("failed to generate the vision response: {0}")]
    FailedToEvaluateVisionPrompt(String),

    /// Native tokenize/decode failure on the plain text path.
    #[error("failed to evaluate the prompt: {0}")]
    FailedToEvaluatePrompt(String),
}

pub type Result<T> = std::result::Result<T, LlamaError>;

#[cfg(test)]
mod tests {
    use super::LlamaError;

    #[test]
    fn display_carries_the_native_reason() {
        let err = LlamaError::CouldNotInitializeContext("could not load model at /tmp/x".into());
        assert_eq!(
            err.to_string(),
            "could not initialize the text model context: could not load model at /tmp/x"
        );

        let err = LlamaError::InvalidVisionInput("no image data supplied".into());
        assert!(err.to_string().starts_with("image data could not be processed"));
    }
}
