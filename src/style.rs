//! Inline `style` attribute parsing.
//!
//! A declaration string such as `color: red; background-image: url("a;b")` is
//! split into ordered `(property, value)` pairs and the property names are
//! re-cased for the target runtime: DOM casing (`backgroundImage`) or CSS
//! casing (`background-image`).

use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use thiserror::Error;

/// Parsed style: property name → value, in declaration order
pub type StyleMap = IndexMap<String, String>;

/// Casing of style property names handed to the renderer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StylePropertyNameCase {
    /// `backgroundColor`, `WebkitTransition`, `msTransform`
    #[default]
    Dom,
    /// `background-color`, `-webkit-transition`, `-ms-transform`
    Css,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StyleError {
    #[error("missing ':' in declaration '{0}'")]
    MissingColon(String),

    #[error("invalid property name '{0}'")]
    InvalidProperty(String),

    #[error("unterminated string starting at byte {0}")]
    UnterminatedString(usize),

    #[error("unterminated comment starting at byte {0}")]
    UnterminatedComment(usize),

    #[error("unbalanced parenthesis")]
    UnbalancedParenthesis,

    #[error("unexpected '{0}' outside of a string")]
    UnexpectedCharacter(char),
}

/// Parse a CSS declaration list into a style map with the requested casing.
pub fn parse_style(source: &str, case: StylePropertyNameCase) -> Result<StyleMap, StyleError> {
    let mut style = StyleMap::new();
    for (name, value) in parse_declarations(source)? {
        let key = match case {
            StylePropertyNameCase::Dom => to_dom_casing(&name),
            StylePropertyNameCase::Css => to_css_casing(&to_dom_casing(&name)),
        };
        style.insert(key, value);
    }
    Ok(style)
}

/// Split `"key: val; key2: val2"` into trimmed pairs, names as written.
pub fn parse_declarations(source: &str) -> Result<Vec<(String, String)>, StyleError> {
    let mut declarations = Vec::new();
    for entry in split_declarations(source)? {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        let colon = entry
            .find(':')
            .ok_or_else(|| StyleError::MissingColon(entry.to_string()))?;
        let name = entry[..colon].trim();
        let value = entry[colon + 1..].trim();

        static PROPERTY_REGEX: OnceLock<Regex> = OnceLock::new();
        let re = PROPERTY_REGEX
            .get_or_init(|| Regex::new(r"^(--[A-Za-z0-9_-]*|-?[A-Za-z_][A-Za-z0-9_-]*)$").unwrap());
        if !re.is_match(name) {
            return Err(StyleError::InvalidProperty(name.to_string()));
        }

        declarations.push((name.to_string(), value.to_string()));
    }
    Ok(declarations)
}

/// Split on top-level `;`, skipping comments and respecting quotes and parens.
fn split_declarations(source: &str) -> Result<Vec<String>, StyleError> {
    let mut entries = Vec::new();
    let mut current = String::new();
    let mut quote: Option<(char, usize)> = None;
    let mut depth = 0usize;
    let mut chars = source.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if let Some((q, _)) = quote {
            current.push(c);
            if c == '\\' {
                if let Some((_, escaped)) = chars.next() {
                    current.push(escaped);
                }
            } else if c == q {
                quote = None;
            }
            continue;
        }

        match c {
            '/' if matches!(chars.peek(), Some((_, '*'))) => {
                chars.next();
                let mut closed = false;
                while let Some((_, inner)) = chars.next() {
                    if inner == '*' && matches!(chars.peek(), Some((_, '/'))) {
                        chars.next();
                        closed = true;
                        break;
                    }
                }
                if !closed {
                    return Err(StyleError::UnterminatedComment(i));
                }
            }
            '"' | '\'' => {
                quote = Some((c, i));
                current.push(c);
            }
            '(' => {
                depth += 1;
                current.push(c);
            }
            ')' => {
                depth = depth.checked_sub(1).ok_or(StyleError::UnbalancedParenthesis)?;
                current.push(c);
            }
            '{' | '}' => return Err(StyleError::UnexpectedCharacter(c)),
            ';' if depth == 0 => entries.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }

    if let Some((_, start)) = quote {
        return Err(StyleError::UnterminatedString(start));
    }
    if depth != 0 {
        return Err(StyleError::UnbalancedParenthesis);
    }
    entries.push(current);
    Ok(entries)
}

/// `background-color` → `backgroundColor`, `-ms-transform` → `msTransform`.
/// Custom properties (`--x`) are returned unchanged.
pub fn to_dom_casing(name: &str) -> String {
    if name.starts_with("--") {
        return name.to_string();
    }
    static DASH_REGEX: OnceLock<Regex> = OnceLock::new();
    let re = DASH_REGEX.get_or_init(|| Regex::new(r"-([a-z])").unwrap());

    let name = match name.strip_prefix("-ms-") {
        Some(rest) => format!("ms-{}", rest),
        None => name.to_string(),
    };
    re.replace_all(&name, |caps: &regex::Captures| caps[1].to_uppercase())
        .into_owned()
}

/// `backgroundColor` → `background-color`, `msTransform` → `-ms-transform`.
pub fn to_css_casing(name: &str) -> String {
    static CAP_REGEX: OnceLock<Regex> = OnceLock::new();
    let re = CAP_REGEX.get_or_init(|| Regex::new(r"[A-Z]").unwrap());

    let to = re
        .replace_all(name, |caps: &regex::Captures| format!("-{}", caps[0].to_lowercase()))
        .into_owned();
    if to.starts_with("ms-") {
        format!("-{}", to)
    } else {
        to
    }
}
