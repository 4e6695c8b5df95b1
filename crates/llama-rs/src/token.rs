// llama-rs/src/token.rs

/// Newtype for llama token IDs (`llama_token` = i32). Keeps token math out
/// of position/sequence arithmetic, which also uses `i32`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct LlamaToken(pub i32);

impl From<i32> for LlamaToken {
    #[inline]
    fn from(id: i32) -> Self {
        LlamaToken(id)
    }
}

impl From<LlamaToken> for i32 {
    #[inline]
    fn from(token: LlamaToken) -> Self {
        token.0
    }
}

#[cfg(test)]
mod tests {
    use super::LlamaToken;

    #[test]
    fn converts_both_ways() {
        let token: LlamaToken = 151645.into();
        assert_eq!(token, LlamaToken(151645));
        assert_eq!(i32::from(token), 151645);
    }
}
