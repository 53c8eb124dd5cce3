//! Tweet payload normalization and decoding
//!
//! Raw payloads come straight out of a CSV cell. Some exports embed the
//! tweet's client link as unescaped HTML inside the `source` field, and long
//! tweets can carry literal line breaks. Both are scrubbed before parsing.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::borrow::Cow;

use crate::error::DecodeError;

static SOURCE_MARKUP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""source":"<a.*?>.*?</a>""#).expect("source markup regex"));

static LINE_BREAKS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\r\n]+").expect("line break regex"));

/// The part of a tweet the counters look at
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Tweet {
    pub text: String,
}

/// Strip ill-formed source markup and line breaks from a raw payload
pub fn normalize(raw: &str) -> Cow<'_, str> {
    let without_source = SOURCE_MARKUP.replace_all(raw, r#""source":"""#);
    let stripped = match LINE_BREAKS.replace_all(&without_source, "") {
        Cow::Borrowed(_) => None,
        Cow::Owned(s) => Some(s),
    };
    match stripped {
        Some(s) => Cow::Owned(s),
        None => without_source,
    }
}

/// Normalize and parse one payload
pub fn decode(raw: &str) -> Result<Tweet, DecodeError> {
    let normalized = normalize(raw);
    if normalized.trim().is_empty() {
        return Err(DecodeError::Empty);
    }
    Ok(serde_json::from_str(&normalized)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_plain_tweet() {
        let tweet = decode(r#"{"id_str":"42","text":"hi @bob #rust","lang":"en"}"#).unwrap();
        assert_eq!(tweet.text, "hi @bob #rust");
    }

    #[test]
    fn test_source_markup_is_stripped() {
        let raw = r#"{"source":"<a href="http://twitter.com" rel="nofollow">Twitter Web</a>","text":"ok"}"#;
        assert!(serde_json::from_str::<serde_json::Value>(raw).is_err());

        let tweet = decode(raw).unwrap();
        assert_eq!(tweet.text, "ok");
        assert_eq!(normalize(raw), r#"{"source":"","text":"ok"}"#);
    }

    #[test]
    fn test_line_breaks_are_removed() {
        let raw = "{\"text\":\"line one\r\n\",\n\"id_str\":\"1\"}";
        let tweet = decode(raw).unwrap();
        assert_eq!(tweet.text, "line one");
    }

    #[test]
    fn test_normalize_borrows_clean_input() {
        let raw = r#"{"text":"clean"}"#;
        assert!(matches!(normalize(raw), Cow::Borrowed(_)));
    }

    #[test]
    fn test_malformed_payloads_are_errors() {
        assert!(matches!(decode(""), Err(DecodeError::Empty)));
        assert!(matches!(decode("  \n"), Err(DecodeError::Empty)));
        assert!(matches!(decode("{not json"), Err(DecodeError::Json(_))));
        assert!(matches!(decode(r#"{"id_str":"1"}"#), Err(DecodeError::Json(_))));
        assert!(matches!(decode(r#"["text"]"#), Err(DecodeError::Json(_))));
    }
}
