use std::ops::Range;

use crate::error::{Result, SignError};
use crate::typed_data::TypedDataDescriptor;

/// Find byte ranges of concatenated JSON objects within a single string by matching braces.
/// - Handles nested objects
/// - Ignores braces that appear inside JSON strings (with escape handling)
/// - Whitespace between objects is allowed; anything else is an error
pub fn document_ranges(input: &str) -> Result<Vec<Range<usize>>> {
    let mut ranges = Vec::new();
    let mut depth: u32 = 0;
    let mut in_string = false;
    let mut escape = false;
    let mut start = 0;

    for (idx, ch) in input.char_indices() {
        if in_string {
            if escape {
                escape = false;
            } else if ch == '\\' {
                escape = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match ch {
            '"' if depth > 0 => in_string = true,
            '{' => {
                if depth == 0 {
                    start = idx;
                }
                depth += 1;
            }
            '}' => {
                if depth == 0 {
                    return Err(SignError::InvalidJson(format!(
                        "unmatched closing brace at byte {idx}"
                    )));
                }
                depth -= 1;
                if depth == 0 {
                    ranges.push(start..idx + 1);
                }
            }
            c if depth == 0 && !c.is_whitespace() => {
                return Err(SignError::InvalidJson(format!(
                    "unexpected `{c}` between documents at byte {idx}"
                )));
            }
            _ => {}
        }
    }

    if depth != 0 {
        return Err(SignError::InvalidJson(format!(
            "unclosed JSON object; brace depth at end is {depth}"
        )));
    }
    Ok(ranges)
}

/// Parses every typed-data document in a file of concatenated JSON objects.
pub fn parse_documents(input: &str) -> Result<Vec<TypedDataDescriptor>> {
    document_ranges(input)?
        .into_iter()
        .map(|range| TypedDataDescriptor::from_json(&input[range]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payloads::{chia_coin_spend, text_message};
    use alloy_primitives::B256;

    #[test]
    fn single_object() {
        let s = r#"{"a":1}"#;
        assert_eq!(document_ranges(s).unwrap(), vec![0..s.len()]);
    }

    #[test]
    fn nested_and_whitespace_separated_objects() {
        let s = "{\"a\":{\"b\":2},\"c\":3}\n  {\"d\":4}\n";
        let parts: Vec<&str> = document_ranges(s)
            .unwrap()
            .into_iter()
            .map(|r| &s[r])
            .collect();
        assert_eq!(parts, vec!["{\"a\":{\"b\":2},\"c\":3}", "{\"d\":4}"]);
    }

    #[test]
    fn braces_inside_strings_are_ignored() {
        let s = r#"{"a":"{not a brace}","b":1}{"c":"}\"}"}"#;
        let parts: Vec<&str> = document_ranges(s)
            .unwrap()
            .into_iter()
            .map(|r| &s[r])
            .collect();
        assert_eq!(parts, vec![r#"{"a":"{not a brace}","b":1}"#, r#"{"c":"}\"}"}"#]);
    }

    #[test]
    fn malformed_input_errors() {
        for (input, needle) in [
            ("}", "unmatched closing brace"),
            ("{", "unclosed JSON object"),
            ("{} x {}", "unexpected `x`"),
        ] {
            let err = document_ranges(input).unwrap_err();
            assert!(err.to_string().contains(needle), "{input}: {err}");
        }
    }

    #[test]
    fn parses_concatenated_descriptors() {
        let text = text_message("Hello, Chia!");
        let spend = chia_coin_spend(B256::repeat_byte(1), B256::repeat_byte(2));
        let file = format!("{}\n{}", text.to_json().unwrap(), spend.to_json().unwrap());

        let docs = parse_documents(&file).unwrap();
        assert_eq!(docs, vec![text, spend]);
    }
}
