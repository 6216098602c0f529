//! Quote- and bracket-aware scanning shared by the DSL and REST parsers.

use crate::error::{ConvertError, ConvertResult};

/// Tracks whether the scan is inside a `'`, `"` or `` ` `` string.
#[derive(Debug, Default)]
pub(crate) struct Quotes {
    quote: Option<char>,
    escaped: bool,
}

impl Quotes {
    /// Feed one character. Returns true when it belongs to a quoted string,
    /// delimiters included.
    pub(crate) fn feed(&mut self, c: char) -> bool {
        if let Some(q) = self.quote {
            if self.escaped {
                self.escaped = false;
            } else if c == '\\' {
                self.escaped = true;
            } else if c == q {
                self.quote = None;
            }
            return true;
        }
        if matches!(c, '\'' | '"' | '`') {
            self.quote = Some(c);
            return true;
        }
        false
    }

    pub(crate) fn is_open(&self) -> bool {
        self.quote.is_some()
    }
}

/// Bracket depth with an upper bound.
#[derive(Debug)]
struct Depth {
    current: usize,
    max: usize,
}

impl Depth {
    fn new(max: usize) -> Self {
        Self { current: 0, max }
    }

    /// Apply an unquoted character. Errors when the bound is exceeded or a
    /// closer has no opener.
    fn feed(&mut self, c: char, input: &str) -> ConvertResult<()> {
        match c {
            '(' | '[' | '{' => {
                self.current += 1;
                if self.current > self.max {
                    return Err(too_deep(input, self.max));
                }
            }
            ')' | ']' | '}' => {
                self.current = self
                    .current
                    .checked_sub(1)
                    .ok_or_else(|| unbalanced(input))?;
            }
            _ => {}
        }
        Ok(())
    }
}

/// Split at every unquoted `sep` outside brackets. Pieces are trimmed and
/// empty pieces dropped, so trailing separators are harmless.
pub(crate) fn split_top_level(input: &str, sep: char, max_depth: usize) -> ConvertResult<Vec<&str>> {
    let mut quotes = Quotes::default();
    let mut depth = Depth::new(max_depth);
    let mut parts = Vec::new();
    let mut start = 0;

    for (i, c) in input.char_indices() {
        if quotes.feed(c) {
            continue;
        }
        if c == sep && depth.current == 0 {
            parts.push(input[start..i].trim());
            start = i + c.len_utf8();
            continue;
        }
        depth.feed(c, input)?;
    }
    if depth.current != 0 || quotes.is_open() {
        return Err(unbalanced(input));
    }
    parts.push(input[start..].trim());
    parts.retain(|p| !p.is_empty());
    Ok(parts)
}

/// Byte index of the bracket closing the one at `open`.
pub(crate) fn matching_close(input: &str, open: usize, max_depth: usize) -> ConvertResult<usize> {
    let mut quotes = Quotes::default();
    let mut depth = Depth::new(max_depth);

    for (i, c) in input[open..].char_indices() {
        if quotes.feed(c) {
            continue;
        }
        depth.feed(c, input)?;
        if depth.current == 0 && matches!(c, ')' | ']' | '}') {
            return Ok(open + i);
        }
    }
    Err(unbalanced(input))
}

/// Byte index of the first unquoted, top-level occurrence of `target`.
pub(crate) fn find_top_level(input: &str, target: char, max_depth: usize) -> ConvertResult<Option<usize>> {
    let mut quotes = Quotes::default();
    let mut depth = Depth::new(max_depth);

    for (i, c) in input.char_indices() {
        if quotes.feed(c) {
            continue;
        }
        if c == target && depth.current == 0 {
            return Ok(Some(i));
        }
        depth.feed(c, input)?;
    }
    Ok(None)
}

/// Reject input longer than `max_len` bytes.
pub(crate) fn check_len(input: &str, max_len: usize) -> ConvertResult<()> {
    check_size(input.len(), max_len)
}

pub(crate) fn check_size(size: usize, max_len: usize) -> ConvertResult<()> {
    if size > max_len {
        return Err(ConvertError::syntax(
            "INPUT_TOO_LARGE",
            format!("input is {} bytes, the limit is {}", size, max_len),
        )
        .hint("raise `max_input_len` in the config if this is expected"));
    }
    Ok(())
}

fn too_deep(input: &str, max: usize) -> ConvertError {
    ConvertError::syntax("NESTING_TOO_DEEP", format!("brackets nest deeper than {}", max))
        .at(excerpt(input))
        .hint("raise `max_depth` in the config if this is expected")
}

fn unbalanced(input: &str) -> ConvertError {
    ConvertError::syntax("UNBALANCED_INPUT", "unbalanced brackets or unterminated string")
        .at(excerpt(input))
}

/// First 80 characters of `input`, for error fragments.
pub(crate) fn excerpt(input: &str) -> String {
    match input.char_indices().nth(80) {
        Some((i, _)) => format!("{}...", &input[..i]),
        None => input.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_respects_brackets_and_quotes() {
        let parts = split_top_level("'a,b', {x: [1, 2]}, f(3, 4),", ',', 8).unwrap();
        assert_eq!(parts, vec!["'a,b'", "{x: [1, 2]}", "f(3, 4)"]);
    }

    #[test]
    fn test_split_escaped_quote() {
        let parts = split_top_level(r"'it\'s', 2", ',', 8).unwrap();
        assert_eq!(parts, vec![r"'it\'s'", "2"]);
    }

    #[test]
    fn test_depth_limit() {
        let err = split_top_level("((((x))))", ',', 3).unwrap_err();
        assert_eq!(err.code(), "NESTING_TOO_DEEP");
    }

    #[test]
    fn test_unbalanced() {
        assert_eq!(split_top_level("f(1", ',', 8).unwrap_err().code(), "UNBALANCED_INPUT");
        assert_eq!(split_top_level("a)", ',', 8).unwrap_err().code(), "UNBALANCED_INPUT");
        assert_eq!(split_top_level("'open", ',', 8).unwrap_err().code(), "UNBALANCED_INPUT");
    }

    #[test]
    fn test_matching_close() {
        let input = "from('a(b)').select()";
        assert_eq!(matching_close(input, 4, 8).unwrap(), 11);
    }

    #[test]
    fn test_find_top_level() {
        assert_eq!(find_top_level("posts(a,b),c", ',', 8).unwrap(), Some(10));
        assert_eq!(find_top_level("'x(' (", '(', 8).unwrap(), Some(5));
    }

    #[test]
    fn test_check_len() {
        assert!(check_len("abc", 3).is_ok());
        assert_eq!(check_len("abcd", 3).unwrap_err().code(), "INPUT_TOO_LARGE");
    }
}
