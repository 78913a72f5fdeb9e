//! Shell-style glob terms.
//!
//! `*` matches any run of characters, `?` a single character and `[...]` a
//! character class (`[!...]` negated). Matching is case-sensitive and covers
//! the whole index key. An unclosed `[` is an ordinary character.

use regex::bytes::Regex;

use crate::error::{Result, StoreError};

const METACHARACTERS: [char; 3] = ['*', '?', '['];

/// Whether a term contains glob metacharacters.
pub fn is_glob(term: &str) -> bool {
    term.contains(METACHARACTERS)
}

/// The part of a term before its first metacharacter.
pub fn literal_prefix(term: &str) -> &str {
    match term.find(METACHARACTERS) {
        Some(position) => &term[..position],
        None => term,
    }
}

/// A compiled glob pattern.
#[derive(Debug, Clone)]
pub struct Glob {
    pattern: String,
    regex: Regex,
}

impl Glob {
    /// Compile a glob pattern.
    pub fn new<S: Into<String>>(pattern: S) -> Result<Self> {
        let pattern = pattern.into();
        let regex = Regex::new(&translate(&pattern)).map_err(|e| {
            StoreError::query(format!("Invalid glob pattern {pattern:?}: {e}"))
        })?;
        Ok(Glob { pattern, regex })
    }

    /// The pattern as written.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// The literal prefix every match starts with.
    pub fn prefix(&self) -> &str {
        literal_prefix(&self.pattern)
    }

    /// Check whether an index key matches the pattern.
    pub fn matches(&self, key: &[u8]) -> bool {
        self.regex.is_match(key)
    }
}

/// Translate a glob into an anchored regular expression.
fn translate(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut regex_pattern = String::from("(?s)^");
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '*' => {
                // Collapse runs of stars
                while i + 1 < chars.len() && chars[i + 1] == '*' {
                    i += 1;
                }
                regex_pattern.push_str(".*");
            }
            '?' => regex_pattern.push('.'),
            '[' => match class_end(&chars, i) {
                Some(end) => {
                    regex_pattern.push_str(&translate_class(&chars[i + 1..end]));
                    i = end;
                }
                None => regex_pattern.push_str("\\["),
            },
            c => regex_pattern.push_str(&regex::escape(c.encode_utf8(&mut [0; 4]))),
        }
        i += 1;
    }

    regex_pattern.push('$');
    regex_pattern
}

/// Position of the `]` closing the class opened at `start`.
///
/// A `]` right after `[` or `[!` belongs to the class.
fn class_end(chars: &[char], start: usize) -> Option<usize> {
    let mut j = start + 1;
    if chars.get(j) == Some(&'!') {
        j += 1;
    }
    if chars.get(j) == Some(&']') {
        j += 1;
    }
    (j..chars.len()).find(|&k| chars[k] == ']')
}

/// Translate a class body. Ranges with reversed bounds match nothing and are
/// dropped; a class left empty never matches.
fn translate_class(body: &[char]) -> String {
    let (negated, body) = match body.split_first() {
        Some(('!', rest)) => (true, rest),
        _ => (false, body),
    };

    let mut items = String::new();
    let mut i = 0;
    while i < body.len() {
        if i + 2 < body.len() && body[i + 1] == '-' {
            let (low, high) = (body[i], body[i + 2]);
            if low <= high {
                push_class_char(&mut items, low);
                items.push('-');
                push_class_char(&mut items, high);
            }
            i += 3;
        } else {
            push_class_char(&mut items, body[i]);
            i += 1;
        }
    }

    match (items.is_empty(), negated) {
        (true, false) => String::from("[^\\x00-\\x{10FFFF}]"),
        (true, true) => String::from("."),
        (false, false) => format!("[{items}]"),
        (false, true) => format!("[^{items}]"),
    }
}

fn push_class_char(class: &mut String, c: char) {
    if c.is_ascii_punctuation() {
        class.push('\\');
    }
    class.push(c);
}
