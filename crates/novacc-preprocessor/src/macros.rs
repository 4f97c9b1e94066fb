//! Macro table and single-pass hybrid macro expansion (spec §4.1).

use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone)]
pub struct MacroDef {
    pub name: String,
    pub is_function_like: bool,
    pub params: Vec<String>,
    pub is_variadic: bool,
    pub body: String,
}

#[derive(Default)]
pub struct MacroTable {
    macros: HashMap<String, MacroDef>,
}

impl MacroTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(&mut self, def: MacroDef) {
        self.macros.insert(def.name.clone(), def);
    }

    pub fn undef(&mut self, name: &str) {
        self.macros.remove(name);
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.macros.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&MacroDef> {
        self.macros.get(name)
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_cont(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Splits a function-like macro invocation's argument list, respecting
/// nested parentheses, string/char literals, and escapes. Angle brackets
/// are never treated as delimiters (spec §4.1).
fn split_arguments(src: &[char], mut i: usize) -> Option<(Vec<String>, usize)> {
    // `src[i]` is expected to be the opening '('.
    if src.get(i) != Some(&'(') {
        return None;
    }
    i += 1;
    let mut args = Vec::new();
    let mut current = String::new();
    let mut depth = 0i32;
    loop {
        let c = *src.get(i)?;
        match c {
            '(' => {
                depth += 1;
                current.push(c);
                i += 1;
            }
            ')' => {
                if depth == 0 {
                    if !(current.is_empty() && args.is_empty()) || !current.trim().is_empty() {
                        args.push(current.trim().to_string());
                    } else if !args.is_empty() {
                        args.push(current.trim().to_string());
                    }
                    i += 1;
                    break;
                }
                depth -= 1;
                current.push(c);
                i += 1;
            }
            ',' if depth == 0 => {
                args.push(current.trim().to_string());
                current.clear();
                i += 1;
            }
            '"' | '\'' => {
                let quote = c;
                current.push(c);
                i += 1;
                while let Some(&c2) = src.get(i) {
                    current.push(c2);
                    i += 1;
                    if c2 == '\\' {
                        if let Some(&esc) = src.get(i) {
                            current.push(esc);
                            i += 1;
                        }
                        continue;
                    }
                    if c2 == quote {
                        break;
                    }
                }
            }
            _ => {
                current.push(c);
                i += 1;
            }
        }
    }
    // Zero-argument invocation `FOO()` yields a single empty-string arg that
    // must be dropped for a zero-parameter macro; the caller reconciles
    // against the macro's declared parameter count.
    if args.len() == 1 && args[0].is_empty() {
        args.clear();
    }
    Some((args, i))
}

fn stringify(arg: &str) -> String {
    let mut out = String::from("\"");
    let mut chars = arg.trim().chars().peekable();
    while let Some(c) = chars.next() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

/// Expands macros in `line`, given the active table and the expanding-set
/// guard (spec testable property 2: `#define A A` must leave `A` literal).
pub fn expand_line(
    line: &str,
    table: &MacroTable,
    expanding: &mut HashSet<String>,
    counter: &mut u64,
    file_name: &str,
    line_number: u32,
    date_str: &str,
    timestamp_str: &str,
) -> String {
    let chars: Vec<char> = line.chars().collect();
    let mut out = String::new();
    let mut i = 0usize;
    while i < chars.len() {
        let c = chars[i];
        if c == '"' || c == '\'' {
            let quote = c;
            out.push(c);
            i += 1;
            while i < chars.len() {
                out.push(chars[i]);
                if chars[i] == '\\' && i + 1 < chars.len() {
                    i += 1;
                    out.push(chars[i]);
                    i += 1;
                    continue;
                }
                let done = chars[i] == quote;
                i += 1;
                if done {
                    break;
                }
            }
            continue;
        }
        if is_ident_start(c) {
            let start = i;
            i += 1;
            while i < chars.len() && is_ident_cont(chars[i]) {
                i += 1;
            }
            let ident: String = chars[start..i].iter().collect();
            match ident.as_str() {
                "__FILE__" => {
                    out.push('"');
                    out.push_str(file_name);
                    out.push('"');
                    continue;
                }
                "__LINE__" => {
                    out.push_str(&line_number.to_string());
                    continue;
                }
                "__DATE__" => {
                    out.push('"');
                    out.push_str(date_str);
                    out.push('"');
                    continue;
                }
                "__TIMESTAMP__" => {
                    out.push('"');
                    out.push_str(timestamp_str);
                    out.push('"');
                    continue;
                }
                "__COUNTER__" => {
                    out.push_str(&counter.to_string());
                    *counter += 1;
                    continue;
                }
                _ => {}
            }
            if expanding.contains(&ident) {
                // Fixed point: a macro already being expanded is emitted
                // literally (spec testable property 2).
                out.push_str(&ident);
                continue;
            }
            if let Some(def) = table.get(&ident) {
                if def.is_function_like {
                    // Look ahead (possibly past trailing whitespace) for `(`.
                    let mut j = i;
                    while j < chars.len() && chars[j].is_whitespace() {
                        j += 1;
                    }
                    if chars.get(j) == Some(&'(') {
                        if let Some((args, end)) = split_arguments(&chars, j) {
                            let expanded = expand_function_like(
                                def, &args, table, expanding, counter, file_name, line_number,
                                date_str, timestamp_str,
                            );
                            expanding.insert(ident.clone());
                            let reexpanded = expand_line(
                                &expanded, table, expanding, counter, file_name, line_number,
                                date_str, timestamp_str,
                            );
                            expanding.remove(&ident);
                            out.push_str(&reexpanded);
                            i = end;
                            continue;
                        }
                    }
                    // No `(` follows: not an invocation, emit literally.
                    out.push_str(&ident);
                    continue;
                } else {
                    expanding.insert(ident.clone());
                    let expanded = expand_line(
                        &def.body, table, expanding, counter, file_name, line_number, date_str,
                        timestamp_str,
                    );
                    expanding.remove(&ident);
                    out.push_str(&expanded);
                    continue;
                }
            }
            out.push_str(&ident);
            continue;
        }
        out.push(c);
        i += 1;
    }
    out
}

#[allow(clippy::too_many_arguments)]
fn expand_function_like(
    def: &MacroDef,
    args: &[String],
    table: &MacroTable,
    expanding: &mut HashSet<String>,
    counter: &mut u64,
    file_name: &str,
    line_number: u32,
    date_str: &str,
    timestamp_str: &str,
) -> String {
    // Pre-expand each argument fully (except where used under # or ##,
    // handled below by substituting the raw text for those operators).
    let expanded_args: Vec<String> = args
        .iter()
        .map(|a| {
            expand_line(
                a, table, expanding, counter, file_name, line_number, date_str, timestamp_str,
            )
        })
        .collect();

    let mut param_index = HashMap::new();
    for (idx, p) in def.params.iter().enumerate() {
        param_index.insert(p.as_str(), idx);
    }
    let variadic_name = if def.is_variadic { "__VA_ARGS__" } else { "" };

    let raw_for = |idx: usize| -> &str {
        args.get(idx).map(|s| s.as_str()).unwrap_or("")
    };
    let expanded_for = |idx: usize| -> &str {
        expanded_args.get(idx).map(|s| s.as_str()).unwrap_or("")
    };
    let variadic_raw = || -> String {
        if def.params.len() >= args.len() {
            String::new()
        } else {
            args[def.params.len()..].join(", ")
        }
    };
    let variadic_expanded = || -> String {
        if def.params.len() >= expanded_args.len() {
            String::new()
        } else {
            expanded_args[def.params.len()..].join(", ")
        }
    };

    let body: Vec<char> = def.body.chars().collect();
    let mut out = String::new();
    let mut i = 0usize;
    while i < body.len() {
        let c = body[i];
        if c == '#' && body.get(i + 1) == Some(&'#') {
            // `##` paste: trim trailing whitespace already emitted, then
            // paste the next token's raw (unexpanded) substitution.
            while out.ends_with(' ') {
                out.pop();
            }
            i += 2;
            while i < body.len() && body[i] == ' ' {
                i += 1;
            }
            let (tok, consumed) = read_token_or_param(&body[i..]);
            i += consumed;
            if tok == variadic_name && def.is_variadic {
                out.push_str(&variadic_raw());
            } else if let Some(&idx) = param_index.get(tok.as_str()) {
                out.push_str(raw_for(idx));
            } else {
                out.push_str(&tok);
            }
            continue;
        }
        if c == '#' {
            i += 1;
            while i < body.len() && body[i] == ' ' {
                i += 1;
            }
            let (tok, consumed) = read_token_or_param(&body[i..]);
            i += consumed;
            if tok == variadic_name && def.is_variadic {
                out.push_str(&stringify(&variadic_raw()));
            } else if let Some(&idx) = param_index.get(tok.as_str()) {
                out.push_str(&stringify(raw_for(idx)));
            } else {
                out.push_str(&tok);
            }
            continue;
        }
        if is_ident_start(c) {
            let start = i;
            i += 1;
            while i < body.len() && is_ident_cont(body[i]) {
                i += 1;
            }
            let ident: String = body[start..i].iter().collect();
            // `##` on the *left* is handled by peeking ahead.
            let mut k = i;
            while k < body.len() && body[k] == ' ' {
                k += 1;
            }
            let pasted_right = body.get(k) == Some(&'#') && body.get(k + 1) == Some(&'#');
            let raw_value = if ident == variadic_name && def.is_variadic {
                Some(variadic_raw())
            } else {
                param_index.get(ident.as_str()).map(|&idx| raw_for(idx).to_string())
            };
            let expanded_value = if ident == variadic_name && def.is_variadic {
                Some(variadic_expanded())
            } else {
                param_index
                    .get(ident.as_str())
                    .map(|&idx| expanded_for(idx).to_string())
            };
            if pasted_right {
                if let Some(v) = raw_value {
                    out.push_str(&v);
                    continue;
                }
            }
            if let Some(v) = expanded_value {
                out.push_str(&v);
                continue;
            }
            out.push_str(&ident);
            continue;
        }
        out.push(c);
        i += 1;
    }
    out
}

/// Reads one token for `#`/`##` operand resolution: an identifier (possibly
/// a parameter name) or, failing that, a single non-space character.
fn read_token_or_param(rest: &[char]) -> (String, usize) {
    if rest.is_empty() {
        return (String::new(), 0);
    }
    if is_ident_start(rest[0]) {
        let mut j = 1;
        while j < rest.len() && is_ident_cont(rest[j]) {
            j += 1;
        }
        (rest[..j].iter().collect(), j)
    } else {
        (rest[0].to_string(), 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expand(src: &str, table: &MacroTable) -> String {
        let mut expanding = HashSet::new();
        let mut counter = 0u64;
        expand_line(src, table, &mut expanding, &mut counter, "test.cpp", 1, "", "")
    }

    #[test]
    fn object_like_macro_expands() {
        let mut table = MacroTable::new();
        table.define(MacroDef {
            name: "FOO".into(),
            is_function_like: false,
            params: vec![],
            is_variadic: false,
            body: "1 + 1".into(),
        });
        assert_eq!(expand("FOO;", &table), "1 + 1;");
    }

    #[test]
    fn self_referential_macro_is_fixed_point() {
        let mut table = MacroTable::new();
        table.define(MacroDef {
            name: "A".into(),
            is_function_like: false,
            params: vec![],
            is_variadic: false,
            body: "A".into(),
        });
        assert_eq!(expand("A", &table), "A");
    }

    #[test]
    fn function_like_macro_substitutes_arguments() {
        let mut table = MacroTable::new();
        table.define(MacroDef {
            name: "DOUBLE".into(),
            is_function_like: true,
            params: vec!["x".into()],
            is_variadic: false,
            body: "((x)*2)".into(),
        });
        assert_eq!(expand("DOUBLE(21)", &table), "((21)*2)");
    }

    #[test]
    fn stringify_wraps_and_escapes() {
        let mut table = MacroTable::new();
        table.define(MacroDef {
            name: "STR".into(),
            is_function_like: true,
            params: vec!["x".into()],
            is_variadic: false,
            body: "#x".into(),
        });
        assert_eq!(expand("STR(a \"b\")", &table), "\"a \\\"b\\\"\"");
    }

    #[test]
    fn paste_concatenates_raw_tokens() {
        let mut table = MacroTable::new();
        table.define(MacroDef {
            name: "CAT".into(),
            is_function_like: true,
            params: vec!["a".into(), "b".into()],
            is_variadic: false,
            body: "a ## b".into(),
        });
        assert_eq!(expand("CAT(foo, bar)", &table), "foobar");
    }

    #[test]
    fn angle_brackets_are_not_argument_delimiters() {
        let mut table = MacroTable::new();
        table.define(MacroDef {
            name: "ID".into(),
            is_function_like: true,
            params: vec!["x".into()],
            is_variadic: false,
            body: "x".into(),
        });
        assert_eq!(expand("ID(a<b)", &table), "a<b");
    }

    #[test]
    fn variadic_macro_joins_trailing_args() {
        let mut table = MacroTable::new();
        table.define(MacroDef {
            name: "LOG".into(),
            is_function_like: true,
            params: vec!["fmt".into()],
            is_variadic: true,
            body: "printf(fmt, __VA_ARGS__)".into(),
        });
        assert_eq!(
            expand("LOG(\"%d %d\", 1, 2)", &table),
            "printf(\"%d %d\", 1, 2)"
        );
    }
}
