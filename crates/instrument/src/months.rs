//! Month universe: the set of contract month codes a rolling set may contain.
//!
//! Callers pass the universe as a string of concatenated or delimited tokens
//! (`"F23G23H23"`, `"FGHJKMNQUVXZ"`, `"F23, G23"`). A token is one ASCII
//! letter followed by any number of ASCII digits.

use crate::error::{InstrumentError, InstrumentResult};
use config::MonthMatch;
use std::collections::BTreeSet;
use std::str::FromStr;

const DELIMITERS: [char; 4] = [',', ';', '|', '/'];

/// Parsed month universe, keeping the raw text for substring matching.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MonthUniverse {
    raw: String,
    tokens: BTreeSet<String>,
}

impl MonthUniverse {
    /// Tokenize a caller-supplied universe string.
    ///
    /// Anything other than a token or a delimiter is an error.
    pub fn parse(raw: &str) -> InstrumentResult<Self> {
        Ok(Self {
            raw: raw.to_string(),
            tokens: tokenize(raw, true)?,
        })
    }

    /// Keep `raw` as given for substring matching.
    ///
    /// Characters the tokenizer does not understand are skipped, so
    /// `"F23-G23"` or `"2023:H23M23"` are accepted.
    pub fn raw(raw: &str) -> Self {
        Self {
            raw: raw.to_string(),
            tokens: tokenize(raw, false).unwrap_or_default(),
        }
    }

    /// Build the universe the way `policy` reads it: strict tokens for
    /// `Exact`, the raw string for `Substring`.
    pub fn for_policy(raw: &str, policy: MonthMatch) -> InstrumentResult<Self> {
        match policy {
            MonthMatch::Exact => Self::parse(raw),
            MonthMatch::Substring => Ok(Self::raw(raw)),
        }
    }

    /// Build a universe from already separated tokens.
    pub fn from_tokens<I, T>(tokens: I) -> InstrumentResult<Self>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let joined: Vec<String> = tokens
            .into_iter()
            .map(|t| t.as_ref().to_string())
            .collect();
        Self::parse(&joined.join(","))
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.tokens.iter().map(String::as_str)
    }

    pub fn as_raw(&self) -> &str {
        &self.raw
    }

    /// Whether `month` belongs to this universe. An empty month never does.
    pub fn contains(&self, month: &str, policy: MonthMatch) -> bool {
        if month.is_empty() {
            return false;
        }
        match policy {
            MonthMatch::Exact => self.tokens.contains(month),
            MonthMatch::Substring => self.raw.contains(month),
        }
    }
}

fn tokenize(raw: &str, strict: bool) -> InstrumentResult<BTreeSet<String>> {
    let mut tokens = BTreeSet::new();
    let mut chars = raw.char_indices().peekable();

    while let Some((start, c)) = chars.next() {
        if c.is_whitespace() || DELIMITERS.contains(&c) {
            continue;
        }
        if !c.is_ascii_alphabetic() {
            if strict {
                return Err(InstrumentError::InvalidMonthUniverse(format!(
                    "unexpected '{}' at offset {} in '{}'",
                    c, start, raw
                )));
            }
            continue;
        }

        let mut end = start + c.len_utf8();
        while let Some(&(idx, d)) = chars.peek() {
            if !d.is_ascii_digit() {
                break;
            }
            end = idx + d.len_utf8();
            chars.next();
        }
        tokens.insert(raw[start..end].to_string());
    }

    Ok(tokens)
}

impl FromStr for MonthUniverse {
    type Err = InstrumentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
