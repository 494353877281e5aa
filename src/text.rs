//! Decoders for the byte strings MagickCore hands back.
//!
//! MagickCore does not promise UTF-8. Free-text fields (names, descriptions,
//! the feature and version strings) are decoded as latin-1, which maps every
//! byte to a code point and so cannot fail. Symbolic fields such as MIME types
//! are required to be plain ASCII.

/// Decode bytes as ISO-8859-1.
pub(crate) fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Decode bytes as ASCII, rejecting anything with the high bit set.
pub(crate) fn ascii(bytes: &[u8]) -> Option<String> {
    if bytes.is_ascii() {
        std::str::from_utf8(bytes).ok().map(str::to_owned)
    } else {
        None
    }
}

/// Split a whitespace-separated native list into its tokens.
pub(crate) fn tokens(bytes: &[u8]) -> Vec<String> {
    latin1(bytes)
        .split_whitespace()
        .map(str::to_owned)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latin1_maps_high_bytes() {
        assert_eq!(latin1(b"Caf\xe9"), "Café");
        assert_eq!(latin1(b""), "");
    }

    #[test]
    fn ascii_accepts_plain() {
        assert_eq!(ascii(b"image/png").as_deref(), Some("image/png"));
    }

    #[test]
    fn ascii_rejects_high_bytes() {
        assert_eq!(ascii(b"image/p\xe9g"), None);
    }

    #[test]
    fn tokens_collapse_repeated_whitespace() {
        let got = tokens(b" OpenMP  HDRI\tCipher \n");
        assert_eq!(got, vec!["OpenMP", "HDRI", "Cipher"]);
    }

    #[test]
    fn tokens_empty() {
        assert!(tokens(b"").is_empty());
        assert!(tokens(b"   ").is_empty());
    }
}
