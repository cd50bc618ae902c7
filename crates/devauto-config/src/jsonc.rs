//! JSON-with-comments support

/// Strip `//` and `/* */` comments outside string literals
pub(crate) fn strip_json_comments(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    let mut in_string = false;

    while let Some(c) = chars.next() {
        if in_string {
            result.push(c);
            match c {
                '\\' => {
                    if let Some(escaped) = chars.next() {
                        result.push(escaped);
                    }
                }
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        let next = chars.peek().copied();
        match (c, next) {
            ('"', _) => {
                in_string = true;
                result.push(c);
            }
            ('/', Some('/')) => {
                while let Some(&nc) = chars.peek() {
                    if nc == '\n' {
                        break;
                    }
                    chars.next();
                }
            }
            ('/', Some('*')) => {
                chars.next();
                let mut prev = '\0';
                for nc in chars.by_ref() {
                    if prev == '*' && nc == '/' {
                        break;
                    }
                    // keep line numbers stable for serde_json error positions
                    if nc == '\n' {
                        result.push('\n');
                    }
                    prev = nc;
                }
            }
            _ => result.push(c),
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_line_and_block_comments() {
        let input = "{\n  // comment\n  \"a\": 1, /* inline */ \"b\": 2\n}";
        let value: serde_json::Value = serde_json::from_str(&strip_json_comments(input)).unwrap();
        assert_eq!(value["a"], 1);
        assert_eq!(value["b"], 2);
    }

    #[test]
    fn test_comment_markers_inside_strings_are_kept() {
        let input = r#"{"url": "https://example.com/a", "glob": "src/*.go"}"#;
        assert_eq!(strip_json_comments(input), input);
    }

    #[test]
    fn test_escaped_quote_does_not_end_string() {
        let input = r#"{"cmd": "echo \"// not a comment\""}"#;
        let value: serde_json::Value = serde_json::from_str(&strip_json_comments(input)).unwrap();
        assert_eq!(value["cmd"], "echo \"// not a comment\"");
    }

    #[test]
    fn test_block_comment_preserves_newlines() {
        let input = "/* a\nb\n*/{}";
        assert_eq!(strip_json_comments(input), "\n\n{}");
    }
}
