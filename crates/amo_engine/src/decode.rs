use std::fmt;

use amo_logging::amo_debug;
use chardetng::EncodingDetector;
use encoding_rs::Encoding;

/// Bytes of the body searched for a `<meta charset>` declaration.
const META_PRESCAN_BYTES: usize = 1024;

/// Where the character encoding of a body was taken from, strongest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharsetOrigin {
    ByteOrderMark,
    Header,
    MetaTag,
    Detected,
}

impl fmt::Display for CharsetOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CharsetOrigin::ByteOrderMark => "byte order mark",
            CharsetOrigin::Header => "content-type header",
            CharsetOrigin::MetaTag => "meta tag",
            CharsetOrigin::Detected => "detection",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedBody {
    pub text: String,
    pub encoding: &'static Encoding,
    pub origin: CharsetOrigin,
}

impl DecodedBody {
    pub fn encoding_label(&self) -> &'static str {
        self.encoding.name()
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CharsetError {
    #[error("body is not valid {encoding} (charset from {origin})")]
    Malformed {
        encoding: &'static str,
        origin: CharsetOrigin,
    },
}

/// Decodes a console response body to UTF-8.
///
/// The encoding comes from the first of: byte order mark, `charset` of the
/// Content-Type header, `<meta charset>` near the top of the page, chardetng.
/// Labels encoding_rs does not know are skipped.
pub fn decode_body(bytes: &[u8], content_type: Option<&str>) -> Result<DecodedBody, CharsetError> {
    let (encoding, origin) = choose_encoding(bytes, content_type);
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        return Err(CharsetError::Malformed {
            encoding: encoding.name(),
            origin,
        });
    }
    Ok(DecodedBody {
        text: text.into_owned(),
        encoding,
        origin,
    })
}

fn choose_encoding(bytes: &[u8], content_type: Option<&str>) -> (&'static Encoding, CharsetOrigin) {
    if let Some((encoding, _)) = Encoding::for_bom(bytes) {
        return (encoding, CharsetOrigin::ByteOrderMark);
    }
    if let Some(encoding) = content_type.and_then(header_charset).and_then(known_label) {
        return (encoding, CharsetOrigin::Header);
    }
    if let Some(encoding) = meta_charset(bytes).and_then(known_label) {
        return (encoding, CharsetOrigin::MetaTag);
    }
    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    (detector.guess(None, true), CharsetOrigin::Detected)
}

fn known_label(label: &str) -> Option<&'static Encoding> {
    let encoding = Encoding::for_label(label.as_bytes());
    if encoding.is_none() {
        amo_debug!("Ignoring unknown charset label {:?}", label);
    }
    encoding
}

fn header_charset(content_type: &str) -> Option<&str> {
    content_type.split(';').find_map(|part| {
        let (key, value) = part.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches(['"', '\'']))
    })
}

/// Label following the first `charset=` in the head of the document.
fn meta_charset(bytes: &[u8]) -> Option<&str> {
    let head = &bytes[..bytes.len().min(META_PRESCAN_BYTES)];
    let start = head
        .windows(8)
        .position(|window| window.eq_ignore_ascii_case(b"charset="))?
        + 8;
    let rest = &head[start..];
    let rest = rest.strip_prefix(b"\"").or_else(|| rest.strip_prefix(b"'")).unwrap_or(rest);
    let end = rest
        .iter()
        .position(|byte| matches!(byte, b'"' | b'\'' | b';' | b'>' | b'/') || byte.is_ascii_whitespace())
        .unwrap_or(rest.len());
    std::str::from_utf8(&rest[..end]).ok().filter(|label| !label.is_empty())
}
