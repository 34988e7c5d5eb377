// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// OCR response envelope decoding.
//
// The service answers either with bare hOCR or with a JSON object whose
// `result` field carries the payload. Some services double-encode: `result`
// is itself a JSON string literal (`"\"<div ...>\""`), which gets one extra
// unescape pass.

use schriftwerk_core::error::{Result, SchriftwerkError};
use serde_json::Value;
use tracing::debug;

/// Unwrap an OCR response body into the hOCR text it carries.
///
/// Only a JSON object is treated as an envelope; any other body, including
/// text that happens to be a JSON scalar such as `2024`, is returned as-is.
pub fn decode_payload(body: &[u8]) -> Result<String> {
    if let Ok(Value::Object(envelope)) = serde_json::from_slice::<Value>(body) {
        let result = match envelope.get("result") {
            Some(Value::String(result)) => result,
            Some(_) => {
                return Err(SchriftwerkError::Decode(
                    "`result` field is not a string".into(),
                ));
            }
            None => {
                return Err(SchriftwerkError::Decode(
                    "JSON response has no `result` field".into(),
                ));
            }
        };
        debug!(payload_chars = result.len(), "Unwrapped JSON envelope");
        return Ok(unquote(result));
    }

    String::from_utf8(body.to_vec()).map_err(|err| {
        SchriftwerkError::Decode(format!("response is not valid UTF-8: {}", err))
    })
}

/// Remove one layer of JSON string quoting when the payload is a complete
/// JSON string literal; otherwise keep it unchanged.
fn unquote(payload: &str) -> String {
    let trimmed = payload.trim();
    if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
        if let Ok(unescaped) = serde_json::from_str::<String>(trimmed) {
            return unescaped;
        }
        debug!("quoted payload is not a JSON string literal; keeping it verbatim");
    }
    payload.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_hocr_passes_through() {
        let body = b"<div class='ocr_page' title='bbox 0 0 10 10'></div>";
        assert_eq!(
            decode_payload(body).unwrap(),
            "<div class='ocr_page' title='bbox 0 0 10 10'></div>"
        );
    }

    #[test]
    fn envelope_result_is_extracted() {
        let body = br#"{"result":"<div class=\"ocr_page\"></div>","version":"1"}"#;
        assert_eq!(
            decode_payload(body).unwrap(),
            r#"<div class="ocr_page"></div>"#
        );
    }

    #[test]
    fn double_encoded_result_is_unescaped_once() {
        // `result` holds the JSON literal "<p>a\nb</p>" including its quotes.
        let body = br#"{"result":"\"<p>a\\nb</p>\""}"#;
        assert_eq!(decode_payload(body).unwrap(), "<p>a\nb</p>");
    }

    #[test]
    fn non_string_result_is_decode_error() {
        let err = decode_payload(br#"{"result": 42}"#).unwrap_err();
        assert!(matches!(err, SchriftwerkError::Decode(_)));
    }

    #[test]
    fn missing_result_is_decode_error() {
        let err = decode_payload(br#"{"error":"no text"}"#).unwrap_err();
        assert!(matches!(err, SchriftwerkError::Decode(_)));
    }

    #[test]
    fn json_scalar_body_is_plain_text() {
        assert_eq!(decode_payload(b"2024").unwrap(), "2024");
        assert_eq!(decode_payload(b"null").unwrap(), "null");
        assert_eq!(decode_payload(b"[1, 2]").unwrap(), "[1, 2]");
    }

    #[test]
    fn quoted_prose_in_result_is_kept_verbatim() {
        let body = br#"{"result":"\"Hello\" she said \"bye\""}"#;
        assert_eq!(
            decode_payload(body).unwrap(),
            r#""Hello" she said "bye""#
        );
    }

    #[test]
    fn invalid_utf8_is_decode_error() {
        assert!(decode_payload(&[0xFF, 0xFE, 0x00]).is_err());
    }
}
