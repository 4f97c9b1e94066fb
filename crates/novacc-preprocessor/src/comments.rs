//! Comment stripping and backslash-continuation joining.
//!
//! Both passes preserve newline characters exactly where they occurred in
//! the original text so that physical source-line numbers stay recoverable
//! from the transformed buffer (needed to build the line map).

use crate::error::{PreprocessError, Result};

/// Joins physical lines ending with `\` (optionally followed by `\r`) into
/// their successor, replacing the backslash-newline with a single space so
/// column offsets within the joined line stay monotonic.
pub fn join_continuations(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            let mut lookahead = chars.clone();
            let mut saw_cr = false;
            if let Some('\r') = lookahead.peek() {
                saw_cr = true;
                lookahead.next();
            }
            if let Some('\n') = lookahead.peek() {
                // Consume the backslash-newline (and optional \r) without
                // emitting any output; next() calls below advance `chars`.
                if saw_cr {
                    chars.next();
                }
                chars.next();
                continue;
            }
        }
        out.push(c);
    }
    out
}

/// Strips `//` and `/* ... */` comments, replacing them with a single space
/// (line comments) or with embedded newlines preserved (block comments),
/// never touching the contents of string or character literals.
pub fn strip_comments(text: &str) -> Result<String> {
    let mut out = String::with_capacity(text.len());
    let bytes: Vec<char> = text.chars().collect();
    let mut i = 0usize;
    let mut line = 1u32;
    while i < bytes.len() {
        let c = bytes[i];
        match c {
            '"' | '\'' => {
                let quote = c;
                out.push(c);
                i += 1;
                while i < bytes.len() {
                    let c = bytes[i];
                    out.push(c);
                    if c == '\n' {
                        line += 1;
                    }
                    i += 1;
                    if c == '\\' && i < bytes.len() {
                        out.push(bytes[i]);
                        if bytes[i] == '\n' {
                            line += 1;
                        }
                        i += 1;
                        continue;
                    }
                    if c == quote {
                        break;
                    }
                }
            }
            '/' if bytes.get(i + 1) == Some(&'/') => {
                while i < bytes.len() && bytes[i] != '\n' {
                    i += 1;
                }
            }
            '/' if bytes.get(i + 1) == Some(&'*') => {
                let start_line = line;
                i += 2;
                let mut closed = false;
                while i + 1 < bytes.len() {
                    if bytes[i] == '*' && bytes[i + 1] == '/' {
                        i += 2;
                        closed = true;
                        break;
                    }
                    if bytes[i] == '\n' {
                        out.push('\n');
                        line += 1;
                    }
                    i += 1;
                }
                if !closed {
                    return Err(PreprocessError::UnterminatedComment { line: start_line });
                }
                out.push(' ');
            }
            _ => {
                out.push(c);
                if c == '\n' {
                    line += 1;
                }
                i += 1;
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_backslash_continued_lines() {
        let src = "int x = 1 + \\\n    2;\n";
        let joined = join_continuations(src);
        assert_eq!(joined, "int x = 1 +     2;\n");
    }

    #[test]
    fn strips_line_comment() {
        let stripped = strip_comments("int x; // comment\nint y;\n").unwrap();
        assert_eq!(stripped, "int x; \nint y;\n");
    }

    #[test]
    fn strips_block_comment_preserving_newlines() {
        let stripped = strip_comments("a/*\nmid\n*/b\n").unwrap();
        assert_eq!(stripped, "a\n\n b\n");
    }

    #[test]
    fn unterminated_block_comment_is_an_error() {
        assert!(strip_comments("/* never closed").is_err());
    }

    #[test]
    fn does_not_strip_slashes_inside_string_literal() {
        let stripped = strip_comments("const char* s = \"http://example\";\n").unwrap();
        assert_eq!(stripped, "const char* s = \"http://example\";\n");
    }
}
