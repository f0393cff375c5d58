//! Template parsing and execution
//!
//! Supports the action syntax used in test files:
//!
//! - `{{.name}}` / `{{ .name }}` - value of a store key
//! - `{{index . "some-key"}}` - value of a key that is not an identifier
//! - `{{"literal"}}` and `` {{`raw`}} `` - string literals
//! - `{{/* comment */}}` - ignored
//! - `{{- ... -}}` - trims surrounding whitespace
//!
//! A key missing from the store renders as an empty string.

use std::collections::HashMap;
use std::fmt::Write as _;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// A parsed template
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    nodes: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Text(String),
    Action(Expr),
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    /// `.`, `.a`, `.a.b` - an empty path is the dot itself
    Field(Vec<String>),
    /// String literal
    Literal(String),
    /// `index <collection> <key>...`
    Index(Box<Expr>, Vec<Expr>),
}

/// Value produced while executing an expression
enum Val<'a> {
    Data(&'a HashMap<String, String>),
    Str(String),
}

impl Template {
    /// Parse template text, failing on syntax errors
    pub fn parse(text: &str) -> Result<Self, String> {
        let mut nodes = Vec::new();
        let mut rest = text;
        let mut trim_next = false;

        while let Some(start) = rest.find(OPEN) {
            let mut literal = &rest[..start];
            if trim_next {
                literal = literal.trim_start();
            }

            let mut inner = &rest[start + OPEN.len()..];
            if let Some(stripped) = strip_trim_marker(inner) {
                literal = literal.trim_end();
                inner = stripped;
            }
            push_text(&mut nodes, literal);

            let end = find_close(inner)?;
            let mut action = &inner[..end];
            rest = &inner[end + CLOSE.len()..];

            trim_next = false;
            if let Some(stripped) = action.strip_suffix(" -") {
                action = stripped;
                trim_next = true;
            }

            if let Some(expr) = parse_action(action)? {
                nodes.push(Node::Action(expr));
            }
        }

        let tail = if trim_next { rest.trim_start() } else { rest };
        push_text(&mut nodes, tail);

        Ok(Self { nodes })
    }

    /// Render the template against the store data
    pub fn execute(&self, data: &HashMap<String, String>) -> Result<String, String> {
        let mut out = String::new();
        for node in &self.nodes {
            match node {
                Node::Text(text) => out.push_str(text),
                Node::Action(expr) => match eval(expr, data)? {
                    Val::Str(s) => out.push_str(&s),
                    Val::Data(map) => out.push_str(&format_map(map)),
                },
            }
        }
        Ok(out)
    }
}

fn push_text(nodes: &mut Vec<Node>, text: &str) {
    if !text.is_empty() {
        nodes.push(Node::Text(text.to_string()));
    }
}

/// `{{- ` trims the preceding text; the dash must be followed by a space
fn strip_trim_marker(inner: &str) -> Option<&str> {
    let after = inner.strip_prefix('-')?;
    after.starts_with(char::is_whitespace).then_some(after)
}

/// Find the closing delimiter, skipping over string literals
fn find_close(inner: &str) -> Result<usize, String> {
    let bytes = inner.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'"' => {
                i += 1;
                while i < bytes.len() && bytes[i] != b'"' {
                    if bytes[i] == b'\\' {
                        i += 1;
                    }
                    i += 1;
                }
                if i >= bytes.len() {
                    return Err("unterminated quoted string".to_string());
                }
            }
            b'`' => {
                i += 1;
                while i < bytes.len() && bytes[i] != b'`' {
                    i += 1;
                }
                if i >= bytes.len() {
                    return Err("unterminated raw quoted string".to_string());
                }
            }
            b'}' if bytes.get(i + 1) == Some(&b'}') => return Ok(i),
            _ => {}
        }
        i += 1;
    }
    Err("unclosed action".to_string())
}

/// Parse the text between delimiters. Comments produce no node.
fn parse_action(action: &str) -> Result<Option<Expr>, String> {
    let trimmed = action.trim();
    if let Some(body) = trimmed.strip_prefix("/*") {
        if body.ends_with("*/") {
            return Ok(None);
        }
        return Err("unclosed comment".to_string());
    }

    let tokens = tokenize(trimmed)?;
    let mut iter = tokens.into_iter();
    let first = iter.next().ok_or_else(|| "missing value for command".to_string())?;

    let expr = match first {
        Token::Ident(name) if name == "index" => {
            let args: Vec<Expr> = iter.map(operand).collect::<Result<_, _>>()?;
            let mut args = args.into_iter();
            let collection = args
                .next()
                .ok_or_else(|| "wrong number of args for index: want at least 1 got 0".to_string())?;
            Expr::Index(Box::new(collection), args.collect())
        }
        Token::Ident(name) => return Err(format!("function \"{}\" not defined", name)),
        token => {
            let expr = operand(token)?;
            if let Some(extra) = iter.next() {
                return Err(format!("can't give argument to non-function {}", extra));
            }
            expr
        }
    };

    Ok(Some(expr))
}

#[derive(Debug)]
enum Token {
    Field(Vec<String>),
    Literal(String),
    Ident(String),
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Field(path) => write!(f, ".{}", path.join(".")),
            Token::Literal(s) => write!(f, "{:?}", s),
            Token::Ident(s) => f.write_str(s),
        }
    }
}

fn operand(token: Token) -> Result<Expr, String> {
    match token {
        Token::Field(path) => Ok(Expr::Field(path)),
        Token::Literal(s) => Ok(Expr::Literal(s)),
        Token::Ident(name) if name == "index" => {
            Err("nested function call requires parentheses".to_string())
        }
        Token::Ident(name) => Err(format!("function \"{}\" not defined", name)),
    }
}

fn tokenize(src: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = src.char_indices().peekable();

    while let Some(&(start, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        match c {
            '"' => {
                chars.next();
                let mut value = String::new();
                loop {
                    match chars.next() {
                        Some((_, '"')) => break,
                        Some((_, '\\')) => match chars.next() {
                            Some((_, 'n')) => value.push('\n'),
                            Some((_, 't')) => value.push('\t'),
                            Some((_, 'r')) => value.push('\r'),
                            Some((_, '\\')) => value.push('\\'),
                            Some((_, '"')) => value.push('"'),
                            Some((_, other)) => {
                                return Err(format!("invalid syntax in string: \\{}", other))
                            }
                            None => return Err("unterminated quoted string".to_string()),
                        },
                        Some((_, ch)) => value.push(ch),
                        None => return Err("unterminated quoted string".to_string()),
                    }
                }
                tokens.push(Token::Literal(value));
            }
            '`' => {
                chars.next();
                let mut value = String::new();
                loop {
                    match chars.next() {
                        Some((_, '`')) => break,
                        Some((_, ch)) => value.push(ch),
                        None => return Err("unterminated raw quoted string".to_string()),
                    }
                }
                tokens.push(Token::Literal(value));
            }
            '.' => {
                let end = word_end(src, start);
                let word = &src[start..end];
                advance_to(&mut chars, end);
                tokens.push(Token::Field(parse_field_path(word)?));
            }
            c if c.is_alphabetic() || c == '_' => {
                let end = word_end(src, start);
                let word = &src[start..end];
                advance_to(&mut chars, end);
                if !word.chars().all(is_ident_char) {
                    return Err(format!("bad character in identifier '{}'", word));
                }
                tokens.push(Token::Ident(word.to_string()));
            }
            other => return Err(format!("unexpected {:?} in command", other)),
        }
    }

    Ok(tokens)
}

fn word_end(src: &str, start: usize) -> usize {
    src[start..]
        .find(char::is_whitespace)
        .map(|offset| start + offset)
        .unwrap_or(src.len())
}

fn advance_to(chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>, end: usize) {
    while chars.peek().is_some_and(|&(i, _)| i < end) {
        chars.next();
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// `.` is the empty path; `.a.b` is `["a", "b"]`
fn parse_field_path(word: &str) -> Result<Vec<String>, String> {
    if word == "." {
        return Ok(Vec::new());
    }

    let mut path = Vec::new();
    for part in word[1..].split('.') {
        if part.is_empty() || !part.chars().all(is_ident_char) {
            return Err(format!("bad character in field name '{}'", word));
        }
        path.push(part.to_string());
    }
    Ok(path)
}

fn eval<'a>(expr: &Expr, data: &'a HashMap<String, String>) -> Result<Val<'a>, String> {
    match expr {
        Expr::Literal(s) => Ok(Val::Str(s.clone())),
        Expr::Field(path) => {
            let mut current = Val::Data(data);
            for name in path {
                current = match current {
                    Val::Data(map) => Val::Str(map.get(name).cloned().unwrap_or_default()),
                    Val::Str(_) => {
                        return Err(format!("can't evaluate field {} in type string", name))
                    }
                };
            }
            Ok(current)
        }
        Expr::Index(collection, keys) => {
            let mut current = eval(collection, data)?;
            for key in keys {
                let key = match eval(key, data)? {
                    Val::Str(s) => s,
                    Val::Data(_) => return Err("cannot index map with a map key".to_string()),
                };
                current = match current {
                    Val::Data(map) => Val::Str(map.get(&key).cloned().unwrap_or_default()),
                    Val::Str(_) => {
                        return Err(format!("can't index item of type string with key {:?}", key))
                    }
                };
            }
            Ok(current)
        }
    }
}

/// Render the whole store the way `{{.}}` prints a map: sorted `map[k:v]`
fn format_map(map: &HashMap<String, String>) -> String {
    let mut keys: Vec<_> = map.keys().collect();
    keys.sort();

    let mut out = String::from("map[");
    for (i, key) in keys.into_iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{}:{}", key, map[key]);
    }
    out.push(']');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn render(text: &str, pairs: &[(&str, &str)]) -> Result<String, String> {
        Template::parse(text)?.execute(&data(pairs))
    }

    #[test]
    fn test_plain_text_passes_through() {
        let template = Template::parse("no markers here").unwrap();
        assert_eq!(template.execute(&HashMap::new()).unwrap(), "no markers here");
    }

    #[test]
    fn test_field_substitution() {
        assert_eq!(render("Hello, {{.name}}!", &[("name", "Bob")]).unwrap(), "Hello, Bob!");
        assert_eq!(render("{{ .name }}", &[("name", "Bob")]).unwrap(), "Bob");
    }

    #[test]
    fn test_missing_key_renders_empty() {
        assert_eq!(render("a{{.missing}}b", &[]).unwrap(), "ab");
    }

    #[test]
    fn test_index_function() {
        let out = render(r#"{{index . "api-key"}}"#, &[("api-key", "secret")]).unwrap();
        assert_eq!(out, "secret");
    }

    #[test]
    fn test_literals_and_comments() {
        assert_eq!(render(r#"{{"x}}y"}}"#, &[]).unwrap(), "x}}y");
        assert_eq!(render("{{`raw`}}", &[]).unwrap(), "raw");
        assert_eq!(render("a{{/* note */}}b", &[]).unwrap(), "ab");
    }

    #[test]
    fn test_trim_markers() {
        assert_eq!(render("a  {{- .x -}}  b", &[("x", "X")]).unwrap(), "aXb");
        // without a following space the dash is not a trim marker
        assert!(render("{{-3}}", &[]).is_err());
    }

    #[test]
    fn test_dot_prints_sorted_map() {
        assert_eq!(render("{{.}}", &[("b", "2"), ("a", "1")]).unwrap(), "map[a:1 b:2]");
    }

    #[test]
    fn test_syntax_errors() {
        assert_eq!(render("{{.name", &[]).unwrap_err(), "unclosed action");
        assert_eq!(render("{{}}", &[]).unwrap_err(), "missing value for command");
        assert_eq!(
            render("{{upper .name}}", &[]).unwrap_err(),
            "function \"upper\" not defined"
        );
        assert!(render("{{.my-key}}", &[]).is_err());
    }

    #[test]
    fn test_field_access_into_string_fails_at_execution() {
        let template = Template::parse("{{.a.b}}").unwrap();
        let err = template.execute(&data(&[("a", "x")])).unwrap_err();
        assert_eq!(err, "can't evaluate field b in type string");
    }

    #[test]
    fn test_unicode_text_is_preserved() {
        assert_eq!(render("Тест {{.x}} ✓", &[("x", "ок")]).unwrap(), "Тест ок ✓");
    }
}
