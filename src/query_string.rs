//! Query-string decoding using nom.
//!
//! ```text
//! ?name__icont=ann&id__any=1%2C2&_order=-id
//! ─┬─ ──────┬───────── ───────────────────
//!  │        │                │
//!  │        │                └── more pairs, split on '&'
//!  │        └── key '=' value, percent-decoded
//!  └── optional leading '?'
//! ```

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while1, take_while_m_n},
    character::complete::char,
    combinator::{map, map_res, opt, rest, value},
    multi::many0,
    sequence::{pair, preceded},
    IResult,
};
use serde_json::Value;

use crate::error::{QfilterError, QfilterResult};
use crate::translator::Params;

/// Parse a query string into an ordered parameter map of strings.
///
/// Pairs without `=` get an empty value. A repeated key keeps its first
/// position and takes the last value.
///
/// ```
/// use qfilter::query_string::parse_query_string;
///
/// let params = parse_query_string("?name__icont=ann&id__any=1%2C2").unwrap();
/// assert_eq!(params["id__any"], "1,2");
/// ```
pub fn parse_query_string(input: &str) -> QfilterResult<Params> {
    parse_pairs(input, Value::String)
}

/// Like [`parse_query_string`], but numbers and booleans become JSON scalars.
pub fn parse_query_string_typed(input: &str) -> QfilterResult<Params> {
    parse_pairs(input, |raw| infer_scalar(&raw))
}

/// Read a raw value as an integer, float, boolean, or else a string.
///
/// A number is only taken when it prints back as the same text, so `007`,
/// `1e3` and integers past `i64` stay strings.
pub fn infer_scalar(raw: &str) -> Value {
    let number = raw
        .parse::<i64>()
        .map(serde_json::Number::from)
        .ok()
        .or_else(|| {
            raw.parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .and_then(serde_json::Number::from_f64)
        })
        .filter(|n| n.to_string() == raw);

    if let Some(n) = number {
        Value::Number(n)
    } else if raw == "true" {
        Value::Bool(true)
    } else if raw == "false" {
        Value::Bool(false)
    } else {
        Value::String(raw.to_string())
    }
}

fn parse_pairs(input: &str, convert: impl Fn(String) -> Value) -> QfilterResult<Params> {
    let leading = input.len() - input.trim_start().len();
    let body = input.trim();
    let (body, offset) = match body.strip_prefix('?') {
        Some(stripped) => (stripped, leading + 1),
        None => (body, leading),
    };

    let mut params = Params::new();
    let mut position = offset;

    for chunk in body.split('&') {
        if !chunk.is_empty() {
            let (raw_key, raw_value) = chunk.split_once('=').unwrap_or((chunk, ""));
            let key = decode(raw_key, position)?;
            let val = decode(raw_value, position + raw_key.len() + 1)?;
            if !key.is_empty() {
                params.insert(key, convert(val));
            }
        }
        position += chunk.len() + 1;
    }

    Ok(params)
}

fn bad_escape(position: usize) -> QfilterError {
    QfilterError::parse(position, "Invalid percent escape")
}

/// Percent-decode one key or value starting at `position` in the input.
///
/// Fails on a malformed escape (at its offset) or when the decoded bytes
/// are not UTF-8 (at the start of the field).
fn decode(input: &str, position: usize) -> QfilterResult<String> {
    match many0(decoded_chunk)(input) {
        Ok(("", chunks)) => {
            let bytes: Vec<u8> = chunks.into_iter().flatten().collect();
            String::from_utf8(bytes).map_err(|_| QfilterError::parse(position, "Invalid UTF-8"))
        }
        Ok((remaining, _)) | Err(nom::Err::Error(nom::error::Error { input: remaining, .. })) => {
            Err(bad_escape(position + input.len() - remaining.len()))
        }
        Err(_) => Err(bad_escape(position)),
    }
}

/// One run of literal bytes, a `+` or a `%XX` escape.
fn decoded_chunk(input: &str) -> IResult<&str, Vec<u8>> {
    alt((
        map(take_while1(|c: char| c != '%' && c != '+'), |s: &str| {
            s.as_bytes().to_vec()
        }),
        value(vec![b' '], char('+')),
        map(percent_escape, |b| vec![b]),
    ))(input)
}

fn percent_escape(input: &str) -> IResult<&str, u8> {
    preceded(
        tag("%"),
        map_res(
            take_while_m_n(2, 2, |c: char| c.is_ascii_hexdigit()),
            |hex: &str| u8::from_str_radix(hex, 16),
        ),
    )(input)
}

/// Split a `key=value` fragment, used by the CLI for `--param` flags.
pub fn split_assignment(input: &str) -> Option<(&str, &str)> {
    let parsed: IResult<&str, (&str, Option<&str>)> = pair(
        take_while1(|c: char| c != '='),
        opt(preceded(char('='), rest)),
    )(input);
    match parsed {
        Ok(("", (key, val))) => Some((key, val.unwrap_or(""))),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_simple_pairs() {
        let params = parse_query_string("a=1&b__cont=x").unwrap();
        let keys: Vec<&str> = params.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["a", "b__cont"]);
        assert_eq!(params["a"], json!("1"));
    }

    #[test]
    fn test_parse_leading_question_mark_and_blanks() {
        let params = parse_query_string("?&a=1&&flag").unwrap();
        assert_eq!(params.len(), 2);
        assert_eq!(params["flag"], json!(""));
    }

    #[test]
    fn test_percent_and_plus_decoding() {
        let params = parse_query_string("q.name__icont=Jos%C3%A9+Ann&_order=-id%2Cname").unwrap();
        assert_eq!(params["q.name__icont"], json!("José Ann"));
        assert_eq!(params["_order"], json!("-id,name"));
    }

    #[test]
    fn test_value_may_contain_equals() {
        let params = parse_query_string("expr=a=b").unwrap();
        assert_eq!(params["expr"], json!("a=b"));
    }

    #[test]
    fn test_repeated_key_keeps_position_takes_last() {
        let params = parse_query_string("a=1&b=2&a=3").unwrap();
        let keys: Vec<&str> = params.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(params["a"], json!("3"));
    }

    #[test]
    fn test_bad_escape_reports_position() {
        let err = parse_query_string("a=1&b=%zz").unwrap_err();
        match err {
            QfilterError::Parse { position, .. } => assert_eq!(position, 6),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_invalid_utf8_is_rejected() {
        let err = parse_query_string("a=1&name=%FF%FE").unwrap_err();
        match err {
            QfilterError::Parse { position, message } => {
                assert_eq!(position, 9);
                assert_eq!(message, "Invalid UTF-8");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_typed_keeps_text_that_does_not_round_trip() {
        let params =
            parse_query_string_typed("zip=007&big=12345678901234567890&exp=1e3&neg=-4&f=2.0")
                .unwrap();
        assert_eq!(params["zip"], json!("007"));
        assert_eq!(params["big"], json!("12345678901234567890"));
        assert_eq!(params["exp"], json!("1e3"));
        assert_eq!(params["neg"], json!(-4));
        assert_eq!(params["f"], json!(2.0));
    }

    #[test]
    fn test_typed_values() {
        let params = parse_query_string_typed("a=1&b=2.5&c=true&d=abc&e=").unwrap();
        assert_eq!(params["a"], json!(1));
        assert_eq!(params["b"], json!(2.5));
        assert_eq!(params["c"], json!(true));
        assert_eq!(params["d"], json!("abc"));
        assert_eq!(params["e"], json!(""));
    }

    #[test]
    fn test_split_assignment() {
        assert_eq!(split_assignment("a__eq=1"), Some(("a__eq", "1")));
        assert_eq!(split_assignment("flag"), Some(("flag", "")));
        assert_eq!(split_assignment("=1"), None);
    }
}
