//! Single-byte text encodings used for MTI, length prefixes and field text.

/// Replacement byte for characters the encoding cannot represent.
const UNMAPPABLE: u8 = b'?';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextEncoding {
    /// ISO 8859-1: every byte maps to the code point of the same value.
    #[default]
    Latin1,
    /// 7-bit ASCII; bytes >= 0x80 decode to U+FFFD.
    Ascii,
}

impl TextEncoding {
    pub fn decode(&self, bytes: &[u8]) -> String {
        match self {
            TextEncoding::Latin1 => bytes.iter().map(|&b| b as char).collect(),
            TextEncoding::Ascii => bytes
                .iter()
                .map(|&b| if b.is_ascii() { b as char } else { char::REPLACEMENT_CHARACTER })
                .collect(),
        }
    }

    pub fn encode(&self, text: &str) -> Vec<u8> {
        let limit = match self {
            TextEncoding::Latin1 => 0xFF,
            TextEncoding::Ascii => 0x7F,
        };
        text.chars()
            .map(|c| if (c as u32) <= limit { c as u8 } else { UNMAPPABLE })
            .collect()
    }

    /// Number of bytes `text` occupies once encoded (one per character).
    pub fn encoded_len(&self, text: &str) -> usize {
        text.chars().count()
    }
}

/// Value of an all-ASCII-digit field such as a length prefix. Signs, spaces and empty
/// input are rejected.
pub(crate) fn parse_digits(bytes: &[u8]) -> Option<usize> {
    if bytes.is_empty() || !bytes.iter().all(u8::is_ascii_digit) {
        return None;
    }
    bytes
        .iter()
        .try_fold(0usize, |acc, &b| acc.checked_mul(10)?.checked_add((b - b'0') as usize))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digits_only() {
        assert_eq!(parse_digits(b"042"), Some(42));
        assert_eq!(parse_digits(b"+42"), None);
        assert_eq!(parse_digits(b" 4"), None);
        assert_eq!(parse_digits(b""), None);
    }

    #[test]
    fn latin1_maps_high_bytes() {
        let bytes = [b'C', 0xE9, 0xFF];
        let s = TextEncoding::Latin1.decode(&bytes);
        assert_eq!(s, "C\u{e9}\u{ff}");
        assert_eq!(TextEncoding::Latin1.encode(&s), bytes);
        assert_eq!(TextEncoding::Latin1.encoded_len(&s), 3);
    }

    #[test]
    fn ascii_replaces_unmappable() {
        assert_eq!(TextEncoding::Ascii.encode("a\u{e9}"), b"a?");
        assert_eq!(TextEncoding::Ascii.decode(&[b'a', 0x80]), "a\u{fffd}");
    }
}
