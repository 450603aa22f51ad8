//! RFC 5322 header handling: block splitting, folding, and RFC 2047 encoded-words.
//!
//! Nothing in this module returns an error. Header text that cannot be
//! decoded as declared degrades to lossy UTF-8.

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, PAD};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use tracing::warn;

/// Base64 engine for `B` encoded-words. Mailers routinely drop the padding
/// and leave stray bits in the last symbol.
const B_ENCODING: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    PAD.with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Decode an optional header value into display text.
///
/// An absent header decodes to the empty string.
pub fn decode_header(value: Option<&str>) -> String {
    match value {
        Some(v) => decode_encoded_words(v.trim()),
        None => String::new(),
    }
}

/// Parse the header block at the top of a raw message.
///
/// Returns `(lowercase_name, unfolded_value)` pairs in message order.
pub fn parse_header_block(raw_message: &[u8]) -> Vec<(String, String)> {
    let end = find_header_end(raw_message).unwrap_or(raw_message.len());
    let text = decode_header_bytes(&raw_message[..end]);
    unfold_headers(&text)
}

/// Find the byte offset where headers end (position of the first blank line).
pub fn find_header_end(data: &[u8]) -> Option<usize> {
    if data.starts_with(b"\n") || data.starts_with(b"\r\n") {
        return Some(0);
    }
    // Look for \n\n or \r\n\r\n
    for i in 0..data.len().saturating_sub(1) {
        if data[i] == b'\n' && data[i + 1] == b'\n' {
            return Some(i);
        }
        if i + 3 < data.len()
            && data[i] == b'\r'
            && data[i + 1] == b'\n'
            && data[i + 2] == b'\r'
            && data[i + 3] == b'\n'
        {
            return Some(i);
        }
    }
    None
}

/// Decode raw header bytes to a string.
///
/// Tries UTF-8 first, then falls back to Windows-1252 (which accepts every byte).
fn decode_header_bytes(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            decoded.into_owned()
        }
    }
}

/// Unfold headers: join continuation lines (starting with space or tab) with the previous header.
fn unfold_headers(text: &str) -> Vec<(String, String)> {
    let mut result: Vec<(String, String)> = Vec::new();

    for line in text.lines() {
        if line.starts_with(' ') || line.starts_with('\t') {
            if let Some(last) = result.last_mut() {
                if !last.1.is_empty() {
                    last.1.push(' ');
                }
                last.1.push_str(line.trim());
            }
        } else if let Some(colon_pos) = line.find(':') {
            let name = line[..colon_pos].trim().to_lowercase();
            let value = line[colon_pos + 1..].trim().to_string();
            result.push((name, value));
        }
    }

    result
}

/// Get the first value for a header name (`name` must be lowercase).
pub fn get_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.as_str())
}

/// Decode RFC 2047 encoded-words in a header value.
///
/// Each `=?charset?B|Q?text?=` fragment is decoded on its own and the results
/// are concatenated in order. Whitespace between two adjacent encoded-words is
/// dropped (RFC 2047 §6.2). A word that is not well formed is kept literally.
///
/// Example: `"=?UTF-8?B?SG9sYQ==?= =?UTF-8?B?IG11bmRv?="` → `"Hola mundo"`
pub fn decode_encoded_words(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut remaining = input;
    let mut last_was_encoded = false;

    while let Some(start) = remaining.find("=?") {
        let before = &remaining[..start];
        if !last_was_encoded || !before.trim().is_empty() {
            result.push_str(before);
        }

        let after_start = &remaining[start + 2..];

        if let Some(word) = decode_one_word(after_start) {
            result.push_str(&word.text);
            remaining = &after_start[word.consumed..];
            last_was_encoded = true;
        } else {
            result.push_str("=?");
            remaining = after_start;
            last_was_encoded = false;
        }
    }

    result.push_str(remaining);
    result
}

struct EncodedWord {
    text: String,
    /// Bytes consumed after the leading `=?`.
    consumed: usize,
}

/// Decode `charset?encoding?text?=` (the part following `=?`).
fn decode_one_word(s: &str) -> Option<EncodedWord> {
    let (charset, rest) = s.split_once('?')?;
    let (encoding, rest) = rest.split_once('?')?;
    let end = rest.find("?=")?;
    let encoded_text = &rest[..end];

    if charset.is_empty() || charset.contains(char::is_whitespace) {
        return None;
    }

    let bytes = match encoding {
        "B" | "b" => {
            let compact: String = encoded_text
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect();
            B_ENCODING.decode(compact).ok()?
        }
        "Q" | "q" => decode_q_encoding(encoded_text),
        _ => return None,
    };

    Some(EncodedWord {
        text: decode_charset(charset, &bytes),
        consumed: charset.len() + 1 + encoding.len() + 1 + end + 2,
    })
}

/// Decode Q-encoding (RFC 2047): underscores → spaces, `=XX` → byte.
fn decode_q_encoding(input: &str) -> Vec<u8> {
    let bytes = input.as_bytes();
    let mut result = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'_' => {
                result.push(b' ');
                i += 1;
            }
            b'=' => {
                match (hex_val(bytes.get(i + 1)), hex_val(bytes.get(i + 2))) {
                    (Some(hi), Some(lo)) => {
                        result.push((hi << 4) | lo);
                        i += 3;
                    }
                    _ => {
                        result.push(b'=');
                        i += 1;
                    }
                }
            }
            b => {
                result.push(b);
                i += 1;
            }
        }
    }
    result
}

fn hex_val(b: Option<&u8>) -> Option<u8> {
    (*b? as char).to_digit(16).map(|d| d as u8)
}

/// Decode bytes using a named charset.
///
/// Unknown charsets, and bytes that are invalid in the declared charset, fall
/// back to lossy UTF-8.
fn decode_charset(charset: &str, bytes: &[u8]) -> String {
    // RFC 2231 allows a language suffix: "UTF-8*it"
    let label = charset.split('*').next().unwrap_or(charset);

    let Some(encoding) = encoding_rs::Encoding::for_label(label.as_bytes()) else {
        warn!(charset = label, "Unknown charset, falling back to UTF-8 lossy");
        return String::from_utf8_lossy(bytes).into_owned();
    };

    match encoding.decode_without_bom_handling_and_without_replacement(bytes) {
        Some(text) => text.into_owned(),
        None => {
            warn!(
                charset = label,
                "Header bytes invalid for declared charset, falling back to UTF-8 lossy"
            );
            String::from_utf8_lossy(bytes).into_owned()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_header_none_is_empty() {
        assert_eq!(decode_header(None), "");
    }

    #[test]
    fn test_decode_base64_encoded_word() {
        let input = "=?UTF-8?B?SG9sYSBtdW5kbw==?=";
        assert_eq!(decode_encoded_words(input), "Hola mundo");
    }

    #[test]
    fn test_decode_base64_without_padding() {
        assert_eq!(decode_encoded_words("=?UTF-8?B?SG9sYQ?="), "Hola");
    }

    #[test]
    fn test_decode_base64_with_trailing_bits() {
        assert_eq!(decode_encoded_words("=?UTF-8?B?RmF0dHVyYR==?="), "Fattura");
    }

    #[test]
    fn test_decode_q_encoded_word() {
        let input = "=?ISO-8859-1?Q?caf=E9?=";
        assert_eq!(decode_encoded_words(input), "café");
    }

    #[test]
    fn test_decode_multiple_encoded_words() {
        let input = "=?UTF-8?B?SG9sYQ==?= =?UTF-8?B?IG11bmRv?=";
        assert_eq!(decode_encoded_words(input), "Hola mundo");
    }

    #[test]
    fn test_decode_mixed_plain_and_encoded() {
        let input = "Re: =?UTF-8?Q?Fattura_n=C2=B0_12?= allegata";
        assert_eq!(decode_encoded_words(input), "Re: Fattura n° 12 allegata");
    }

    #[test]
    fn test_decode_fragments_in_different_charsets() {
        let input = "=?ISO-8859-1?Q?Citt=E0?= =?UTF-8?B?IGRpIFJvbWE=?=";
        assert_eq!(decode_encoded_words(input), "Città di Roma");
    }

    #[test]
    fn test_invalid_bytes_for_charset_fall_back_to_lossy_utf8() {
        // 0xFF is not valid UTF-8; declared charset is UTF-8.
        let decoded = decode_encoded_words("=?UTF-8?Q?ok=FF?=");
        assert!(decoded.starts_with("ok"));
    }

    #[test]
    fn test_unknown_charset_falls_back() {
        let decoded = decode_encoded_words("=?X-NOPE?Q?plain?=");
        assert_eq!(decoded, "plain");
    }

    #[test]
    fn test_malformed_words_stay_literal() {
        assert_eq!(decode_encoded_words("=?UTF-8?Z?abc?="), "=?UTF-8?Z?abc?=");
        assert_eq!(decode_encoded_words("=?broken"), "=?broken");
        assert_eq!(decode_encoded_words("price =? 10"), "price =? 10");
    }

    #[test]
    fn test_truncated_q_escape() {
        assert_eq!(decode_encoded_words("=?UTF-8?Q?a=4?="), "a=4");
    }

    #[test]
    fn test_charset_language_suffix() {
        assert_eq!(decode_encoded_words("=?UTF-8*it?Q?Citt=C3=A0?="), "Città");
    }

    #[test]
    fn test_unfold_headers() {
        let text = "Subject: This is a long\n\tsubject line\nFrom: user@example.com\n";
        let headers = unfold_headers(text);
        assert_eq!(headers.len(), 2);
        assert_eq!(headers[0].0, "subject");
        assert_eq!(headers[0].1, "This is a long subject line");
    }

    #[test]
    fn test_parse_header_block_stops_at_body() {
        let raw = b"From: a@b.it\r\nSubject: Hi\r\n\r\nX-Not-A-Header: body\r\n";
        let headers = parse_header_block(raw);
        assert_eq!(headers.len(), 2);
        assert_eq!(get_header(&headers, "subject"), Some("Hi"));
        assert_eq!(get_header(&headers, "x-not-a-header"), None);
    }

    #[test]
    fn test_parse_header_block_latin1_bytes() {
        let raw = b"Subject: Citt\xe0\n\nbody";
        let headers = parse_header_block(raw);
        assert_eq!(get_header(&headers, "subject"), Some("Città"));
    }

    #[test]
    fn test_find_header_end() {
        let data = b"From: a@b.com\nSubject: Hi\n\nBody\n";
        assert_eq!(find_header_end(data), Some(25));
        let data = b"From: a@b.com\r\nSubject: Hi\r\n\r\nBody\r\n";
        assert_eq!(find_header_end(data), Some(26));
        assert_eq!(find_header_end(b"\r\nBody"), Some(0));
        assert_eq!(find_header_end(b"Subject: only headers"), None);
    }
}
