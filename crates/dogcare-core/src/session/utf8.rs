// Token pieces are raw bytes and routinely split a multi-byte codepoint
// across two decode steps (Korean and emoji output hit this constantly).
// Fragments sit here until the buffer decodes, then flush as one delta.

/// Ordered buffer of not-yet-valid-UTF-8 token fragments.
#[derive(Debug, Default)]
pub(crate) struct PendingUtf8 {
    bytes: Vec<u8>,
}

impl PendingUtf8 {
    /// Append a token's raw bytes and flush whatever now decodes.
    ///
    /// Whole buffer valid → flush it all. Invalid, but some proper suffix
    /// valid → the head bytes can never complete a codepoint anymore, so
    /// flush the whole buffer lossily. Otherwise hold everything.
    pub(crate) fn push(&mut self, piece: &[u8]) -> String {
        self.bytes.extend_from_slice(piece);

        if let Ok(text) = std::str::from_utf8(&self.bytes) {
            let text = text.to_owned();
            self.bytes.clear();
            return text;
        }

        let has_valid_suffix = (1..self.bytes.len())
            .any(|start| std::str::from_utf8(&self.bytes[start..]).is_ok());
        if has_valid_suffix {
            let text = String::from_utf8_lossy(&self.bytes).into_owned();
            self.bytes.clear();
            return text;
        }

        #[cfg(feature = "utf8-trace")]
        println!("⏳ [utf8] holding {} pending bytes", self.bytes.len());
        String::new()
    }

    /// Flush everything, valid or not. Terminal step only.
    pub(crate) fn flush(&mut self) -> String {
        if self.bytes.is_empty() {
            return String::new();
        }
        let text = String::from_utf8_lossy(&self.bytes).into_owned();
        self.bytes.clear();
        text
    }

    pub(crate) fn clear(&mut self) {
        self.bytes.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::PendingUtf8;

    #[test]
    fn ascii_flushes_immediately() {
        let mut pending = PendingUtf8::default();
        assert_eq!(pending.push(b"Hello"), "Hello");
        assert_eq!(pending.push(b", world"), ", world");
        assert_eq!(pending.flush(), "");
    }

    #[test]
    fn split_three_byte_codepoint_flushes_on_completion() {
        // "멍" (U+BA4D) encodes as EB A9 8D; split 1 + 2 across tokens.
        let bytes = "멍".as_bytes();
        let mut pending = PendingUtf8::default();

        assert_eq!(pending.push(&bytes[..1]), "");
        assert_eq!(pending.push(&bytes[1..]), "멍");
        assert_eq!(pending.flush(), "");
    }

    #[test]
    fn split_four_byte_emoji_across_three_tokens() {
        // 🐶 (U+1F436) is four bytes; feed one at a time.
        let bytes = "🐶".as_bytes();
        let mut pending = PendingUtf8::default();

        assert_eq!(pending.push(&bytes[..1]), "");
        assert_eq!(pending.push(&bytes[1..2]), "");
        assert_eq!(pending.push(&bytes[2..3]), "");
        assert_eq!(pending.push(&bytes[3..]), "🐶");
    }

    #[test]
    fn complete_codepoint_after_partial_one_flushes_lossily() {
        // A dangling lead byte followed by a full ASCII piece: the lead
        // byte can never complete, so the buffer flushes with U+FFFD.
        let mut pending = PendingUtf8::default();
        assert_eq!(pending.push(&[0xEB]), "");
        let out = pending.push(b"ok");
        assert!(out.contains('\u{FFFD}'));
        assert!(out.ends_with("ok"));
    }

    #[test]
    fn terminal_flush_is_lossy_and_clears() {
        let mut pending = PendingUtf8::default();
        assert_eq!(pending.push(&[0xEB, 0xA9]), "");
        let out = pending.flush();
        assert!(out.contains('\u{FFFD}'));
        assert_eq!(pending.flush(), "");
    }

    #[test]
    fn mixed_korean_sentence_streams_cleanly() {
        let text = "산책 갈까요?";
        let bytes = text.as_bytes();
        let mut pending = PendingUtf8::default();

        let mut out = String::new();
        for chunk in bytes.chunks(1) {
            out.push_str(&pending.push(chunk));
        }
        assert_eq!(out, text);
    }
}
