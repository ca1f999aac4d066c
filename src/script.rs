//! Statement parser for imperative provisioning scripts.
//!
//! Scripts are processed strictly line by line in original execution order.
//! Each line yields exactly one `SourceUnit`; lines the tokenizer cannot
//! interpret become identifier-less units so downstream stages report them
//! as gaps instead of aborting the file.

use crate::schema::{ParamValue, SourceUnit, UnitKind, UnitRef};
use std::collections::BTreeMap;

/// Identifier assigned to variable-assignment statements.
pub const ASSIGN_IDENT: &str = "assign";
/// Identifier assigned to guard conditionals (`if (...) { throw ... }`).
pub const GUARD_IDENT: &str = "if";

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(String),
    Flag(String),
    Str(String),
    VarRef(String),
    LParen,
    RParen,
    Comma,
    Eq,
}

/// Parse a script into an ordered sequence of statement units.
///
/// Pure function of the input text: blank lines and `#` comments are
/// skipped, everything else produces a unit at its original line number.
pub fn parse_script(content: &str) -> Vec<SourceUnit> {
    let mut units = Vec::new();

    for (idx, line) in content.lines().enumerate() {
        let line_number = (idx + 1) as u64;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let reference = UnitRef {
            position: units.len(),
            line: Some(line_number),
            node_id: None,
        };
        units.push(parse_line(reference, trimmed));
    }

    units
}

fn parse_line(reference: UnitRef, line: &str) -> SourceUnit {
    let unit = |ident: Option<String>, params: BTreeMap<String, ParamValue>| SourceUnit {
        reference: reference.clone(),
        kind: UnitKind::Statement,
        raw: line.to_string(),
        ident,
        params,
    };

    let Some(tokens) = tokenize(line) else {
        return unit(None, BTreeMap::new());
    };
    if tokens.is_empty() {
        return unit(None, BTreeMap::new());
    }

    match &tokens[0] {
        // `$name = <value>` normalizes to an assignment statement.
        Token::VarRef(name) => match parse_assignment(name, &tokens[1..], line) {
            Some(params) => unit(Some(ASSIGN_IDENT.to_string()), params),
            None => unit(None, BTreeMap::new()),
        },
        Token::Word(word) if word.eq_ignore_ascii_case(GUARD_IDENT) => {
            // Guard conditionals keep their raw text; the classifier decides
            // whether the shape aborts the run.
            unit(Some(GUARD_IDENT.to_string()), BTreeMap::new())
        }
        Token::Word(word) => {
            let ident = word.clone();
            if tokens.get(1) == Some(&Token::LParen) {
                match parse_call_params(&tokens[2..]) {
                    Some(params) => unit(Some(ident), params),
                    None => unit(None, BTreeMap::new()),
                }
            } else {
                match parse_flag_params(&tokens[1..]) {
                    Some(params) => unit(Some(ident), params),
                    None => unit(None, BTreeMap::new()),
                }
            }
        }
        _ => unit(None, BTreeMap::new()),
    }
}

/// `$name = value`, with any multi-token right-hand side preserved verbatim.
fn parse_assignment(
    name: &str,
    rest: &[Token],
    line: &str,
) -> Option<BTreeMap<String, ParamValue>> {
    if rest.first() != Some(&Token::Eq) {
        return None;
    }

    let value = match &rest[1..] {
        [single] => token_value(single)?,
        [] => return None,
        _ => {
            let (_, rhs) = line.split_once('=')?;
            ParamValue::Literal(rhs.trim().to_string())
        }
    };

    let mut params = BTreeMap::new();
    params.insert("name".to_string(), ParamValue::Literal(name.to_string()));
    params.insert("value".to_string(), value);
    Some(params)
}

/// Cmdlet form: `-Name value` pairs; a flag without a value is a switch.
fn parse_flag_params(tokens: &[Token]) -> Option<BTreeMap<String, ParamValue>> {
    let mut params = BTreeMap::new();
    let mut cursor = tokens.iter().peekable();

    while let Some(token) = cursor.next() {
        let Token::Flag(name) = token else {
            return None;
        };
        let value = match cursor.peek() {
            Some(&next) => match token_value(next) {
                Some(value) => {
                    cursor.next();
                    value
                }
                None => ParamValue::Literal("true".to_string()),
            },
            None => ParamValue::Literal("true".to_string()),
        };
        params.insert(name.clone(), value);
    }

    Some(params)
}

/// Call form: `name(key=value, key=value)`.
fn parse_call_params(tokens: &[Token]) -> Option<BTreeMap<String, ParamValue>> {
    let mut params = BTreeMap::new();
    let mut rest = tokens;

    loop {
        match rest {
            [Token::RParen] => return Some(params),
            [Token::Word(key), Token::Eq, value, tail @ ..] => {
                params.insert(key.clone(), token_value(value)?);
                rest = match tail {
                    [Token::Comma, after @ ..] => after,
                    [Token::RParen] => return Some(params),
                    _ => return None,
                };
            }
            _ => return None,
        }
    }
}

fn token_value(token: &Token) -> Option<ParamValue> {
    match token {
        Token::Str(value) | Token::Word(value) => Some(ParamValue::Literal(value.clone())),
        Token::VarRef(name) => Some(ParamValue::VarRef(name.clone())),
        _ => None,
    }
}

/// Tokenize one line; `None` marks a malformed line (for example an
/// unterminated string), which the caller degrades to an unknown unit.
fn tokenize(line: &str) -> Option<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = line.chars().peekable();

    while let Some(&ch) = chars.peek() {
        match ch {
            ' ' | '\t' => {
                chars.next();
            }
            '#' => break,
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            ',' => {
                chars.next();
                tokens.push(Token::Comma);
            }
            '=' => {
                chars.next();
                tokens.push(Token::Eq);
            }
            '"' | '\'' => {
                chars.next();
                tokens.push(Token::Str(read_quoted(&mut chars, ch)?));
            }
            '$' => {
                chars.next();
                let name = read_word(&mut chars);
                if name.is_empty() {
                    return None;
                }
                tokens.push(Token::VarRef(name));
            }
            '-' => {
                chars.next();
                match chars.peek() {
                    Some(c) if c.is_ascii_alphabetic() => {
                        tokens.push(Token::Flag(read_word(&mut chars)));
                    }
                    Some(c) if c.is_ascii_digit() => {
                        tokens.push(Token::Word(format!("-{}", read_word(&mut chars))));
                    }
                    _ => return None,
                }
            }
            c if c.is_ascii_alphanumeric() || c == '_' => {
                tokens.push(Token::Word(read_word(&mut chars)));
            }
            '{' | '}' | '|' | ';' | '.' | '[' | ']' | '!' | '<' | '>' => {
                // Block bodies and pipelines are outside the line grammar;
                // the statement still parses if they follow a guard keyword.
                chars.next();
                tokens.push(Token::Word(ch.to_string()));
            }
            _ => return None,
        }
    }

    Some(tokens)
}

fn read_quoted(chars: &mut std::iter::Peekable<std::str::Chars<'_>>, quote: char) -> Option<String> {
    let mut value = String::new();
    for ch in chars.by_ref() {
        if ch == quote {
            return Some(value);
        }
        value.push(ch);
    }
    None
}

fn read_word(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut word = String::new();
    while let Some(&ch) = chars.peek() {
        if ch.is_ascii_alphanumeric() || matches!(ch, '_' | '-' | '.' | ':' | '/') {
            word.push(ch);
            chars.next();
        } else {
            break;
        }
    }
    word
}
