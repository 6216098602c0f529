//! JS literal decoding for method-call arguments.
//!
//! Accepts the subset client code passes to query builders: `'single'`,
//! `"double"` and `` `template` `` strings, numbers, booleans,
//! `null`/`undefined`, arrays, and objects with bare or quoted keys and
//! trailing commas. Bare identifiers decode to their name as a string.

use nom::{
    IResult,
    branch::alt,
    bytes::complete::take_while1,
    character::complete::{char, digit1, multispace0, one_of},
    combinator::{all_consuming, map, opt, recognize},
    error::{Error, ErrorKind},
    multi::separated_list0,
    sequence::{delimited, pair, tuple},
};
use serde_json::Value as JsonValue;

/// Decode one argument. Never fails: JSON first, then the JS literal
/// grammar, then the raw text as an opaque string.
pub fn decode_arg(raw: &str, max_depth: usize) -> JsonValue {
    let raw = raw.trim();
    if (raw.starts_with('{') || raw.starts_with('['))
        && let Ok(value) = serde_json::from_str::<JsonValue>(raw)
    {
        return value;
    }
    parse_js_literal(raw, max_depth).unwrap_or_else(|| JsonValue::String(raw.to_string()))
}

/// Parse a complete JS literal, or `None` when the input is outside the
/// subset or nests deeper than `max_depth`.
pub fn parse_js_literal(input: &str, max_depth: usize) -> Option<JsonValue> {
    all_consuming(delimited(multispace0, |i| value(i, 0, max_depth), multispace0))(input)
        .ok()
        .map(|(_, v)| v)
}

fn value(input: &str, depth: usize, max: usize) -> IResult<&str, JsonValue> {
    alt((
        map(quoted, JsonValue::String),
        number,
        |i| array(i, depth, max),
        |i| object(i, depth, max),
        word,
    ))(input)
}

/// A quoted string in any of the three JS quote styles.
fn quoted(input: &str) -> IResult<&str, String> {
    let mut chars = input.char_indices();
    let quote = match chars.next() {
        Some((_, q @ ('\'' | '"' | '`'))) => q,
        _ => return Err(nom::Err::Error(Error::new(input, ErrorKind::Char))),
    };
    let mut out = String::new();
    while let Some((i, c)) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some((_, 'n')) => out.push('\n'),
                Some((_, 't')) => out.push('\t'),
                Some((_, 'r')) => out.push('\r'),
                Some((_, other)) => out.push(other),
                None => break,
            },
            c if c == quote => return Ok((&input[i + 1..], out)),
            c => out.push(c),
        }
    }
    Err(nom::Err::Error(Error::new(input, ErrorKind::Char)))
}

fn number(input: &str) -> IResult<&str, JsonValue> {
    let (rest, text) = recognize(tuple((
        opt(char('-')),
        digit1,
        opt(pair(char('.'), digit1)),
        opt(tuple((one_of("eE"), opt(one_of("+-")), digit1))),
    )))(input)?;
    let value = match text.parse::<serde_json::Number>() {
        Ok(n) => JsonValue::Number(n),
        Err(_) => JsonValue::String(text.to_string()),
    };
    Ok((rest, value))
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

/// Keywords, or a bare identifier kept as its name.
fn word(input: &str) -> IResult<&str, JsonValue> {
    map(take_while1(is_ident_char), |w: &str| match w {
        "true" => JsonValue::Bool(true),
        "false" => JsonValue::Bool(false),
        "null" | "undefined" => JsonValue::Null,
        other => JsonValue::String(other.to_string()),
    })(input)
}

fn comma(input: &str) -> IResult<&str, char> {
    delimited(multispace0, char(','), multispace0)(input)
}

fn close(input: &str, closer: char) -> IResult<&str, char> {
    let (input, _) = tuple((multispace0, opt(char(',')), multispace0))(input)?;
    char(closer)(input)
}

fn enter(input: &str, depth: usize, max: usize) -> Result<(), nom::Err<Error<&str>>> {
    if depth >= max {
        return Err(nom::Err::Failure(Error::new(input, ErrorKind::TooLarge)));
    }
    Ok(())
}

fn array(input: &str, depth: usize, max: usize) -> IResult<&str, JsonValue> {
    let (input, _) = char('[')(input)?;
    enter(input, depth, max)?;
    let (input, _) = multispace0(input)?;
    let (input, items) = separated_list0(comma, |i| value(i, depth + 1, max))(input)?;
    let (input, _) = close(input, ']')?;
    Ok((input, JsonValue::Array(items)))
}

fn object(input: &str, depth: usize, max: usize) -> IResult<&str, JsonValue> {
    let (input, _) = char('{')(input)?;
    enter(input, depth, max)?;
    let (input, _) = multispace0(input)?;
    let (input, entries) = separated_list0(comma, |i| entry(i, depth + 1, max))(input)?;
    let (input, _) = close(input, '}')?;
    Ok((input, JsonValue::Object(entries.into_iter().collect())))
}

fn entry(input: &str, depth: usize, max: usize) -> IResult<&str, (String, JsonValue)> {
    let (input, key) = alt((quoted, map(take_while1(is_ident_char), String::from)))(input)?;
    let (input, _) = delimited(multispace0, char(':'), multispace0)(input)?;
    let (input, value) = value(input, depth, max)?;
    Ok((input, (key, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scalars() {
        assert_eq!(decode_arg("'users'", 8), json!("users"));
        assert_eq!(decode_arg("\"users\"", 8), json!("users"));
        assert_eq!(decode_arg("`users`", 8), json!("users"));
        assert_eq!(decode_arg("18", 8), json!(18));
        assert_eq!(decode_arg("-2.5", 8), json!(-2.5));
        assert_eq!(decode_arg("true", 8), json!(true));
        assert_eq!(decode_arg("undefined", 8), json!(null));
    }

    #[test]
    fn test_escapes() {
        assert_eq!(decode_arg(r"'O\'Brien'", 8), json!("O'Brien"));
        assert_eq!(decode_arg(r#""say \"hi\"""#, 8), json!("say \"hi\""));
    }

    #[test]
    fn test_object_with_bare_keys_and_trailing_comma() {
        let value = decode_arg("{ name: 'Alice', age: 30, tags: ['a', 'b',], }", 8);
        assert_eq!(value, json!({"name": "Alice", "age": 30, "tags": ["a", "b"]}));
    }

    #[test]
    fn test_key_order_is_preserved() {
        let value = decode_arg("{ b: 1, a: 2 }", 8);
        let keys: Vec<&String> = value.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["b", "a"]);
    }

    #[test]
    fn test_strict_json_first() {
        assert_eq!(decode_arg(r#"{"k": [1, null]}"#, 8), json!({"k": [1, null]}));
    }

    #[test]
    fn test_bare_identifier_is_opaque() {
        assert_eq!(decode_arg("{ ascending: false, col: userId }", 8), json!({"ascending": false, "col": "userId"}));
    }

    #[test]
    fn test_unparsable_falls_back_to_raw() {
        assert_eq!(decode_arg("new Date()", 8), json!("new Date()"));
        assert_eq!(decode_arg("{ a: 1 + 2 }", 8), json!("{ a: 1 + 2 }"));
    }

    #[test]
    fn test_depth_bound() {
        assert!(parse_js_literal("[[[1]]]", 3).is_some());
        assert!(parse_js_literal("[[[1]]]", 2).is_none());
    }
}
