//! Text helpers used to sort posts into the two tracked candidate camps.
//!
//! Everything here is a pure function over `serde_json::Value`, so post
//! payloads can be fed in without first deciding what shape they have.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static LEFT_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?i)clinton").expect("valid left regex"),
        Regex::new(r"(?i)kaine").expect("valid left regex"),
    ]
});

static RIGHT_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?i)trump").expect("valid right regex"),
        Regex::new(r"(?i)pence").expect("valid right regex"),
    ]
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Left,
    Right,
}

impl Category {
    pub fn label(&self) -> &'static str {
        match self {
            Category::Left => "left",
            Category::Right => "right",
        }
    }

    fn patterns(&self) -> &'static [Regex] {
        match self {
            Category::Left => &LEFT_PATTERNS,
            Category::Right => &RIGHT_PATTERNS,
        }
    }
}

/// Render a value as text with surrounding whitespace removed.
///
/// `null` and `false` become the empty string. Numbers keep their decimal
/// form (`0` stays `"0"`), and arrays or objects render as compact JSON.
pub fn trim(value: impl Into<Value>) -> String {
    match value.into() {
        Value::Null | Value::Bool(false) => String::new(),
        Value::Bool(true) => "true".to_string(),
        Value::Number(n) => number_text(&n),
        Value::String(s) => s.trim().to_string(),
        other => other.to_string().trim().to_string(),
    }
}

// Whole floats print without a fraction, so `1.0` reads as `"1"`.
fn number_text(n: &serde_json::Number) -> String {
    match n.as_f64() {
        Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 1e15 => {
            if f == 0.0 {
                "0".to_string()
            } else {
                format!("{:.0}", f)
            }
        }
        _ => n.to_string(),
    }
}

/// True when the trimmed text matches at least one of `patterns`.
pub fn match_any(value: impl Into<Value>, patterns: &[Regex]) -> bool {
    let text = trim(value);
    if text.is_empty() {
        return false;
    }
    patterns.iter().any(|re| re.is_match(&text))
}

pub fn is_left(value: impl Into<Value>) -> bool {
    match_any(value, Category::Left.patterns())
}

pub fn is_right(value: impl Into<Value>) -> bool {
    match_any(value, Category::Right.patterns())
}

/// Every category the value falls into. A string naming both camps yields both.
pub fn categories(value: impl Into<Value>) -> Vec<Category> {
    let text = trim(value);
    [Category::Left, Category::Right]
        .into_iter()
        .filter(|category| match_any(text.as_str(), category.patterns()))
        .collect()
}

/// Look up an object field or array element, `None` when it isn't there.
///
/// Empty keys never match, and scalars have no properties. Arrays accept
/// numeric string keys as well as indices, so `"1"` finds the second element.
pub fn prop<'a, I>(value: &'a Value, key: I) -> Option<&'a Value>
where
    I: serde_json::value::Index + PropKey,
{
    if key.is_blank() {
        return None;
    }
    if let (Value::Array(items), Some(index)) = (value, key.array_index()) {
        return items.get(index);
    }
    value.get(key)
}

/// Keys accepted by [`prop`].
pub trait PropKey {
    fn is_blank(&self) -> bool;

    fn array_index(&self) -> Option<usize>;
}

impl PropKey for usize {
    fn is_blank(&self) -> bool {
        false
    }

    fn array_index(&self) -> Option<usize> {
        Some(*self)
    }
}

impl PropKey for &str {
    fn is_blank(&self) -> bool {
        self.is_empty()
    }

    fn array_index(&self) -> Option<usize> {
        self.parse().ok()
    }
}

impl PropKey for String {
    fn is_blank(&self) -> bool {
        self.is_empty()
    }

    fn array_index(&self) -> Option<usize> {
        self.parse().ok()
    }
}
