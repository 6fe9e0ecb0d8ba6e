// Compound primary keys
//
// Several model tables identify rows by a tuple of component fields
// joined with `|` (`tenant|vnsname`, `address-space|vlan|mac`). A
// component that itself contains the separator or a backslash is escaped
// with a backslash, so splitting a rendered key always yields the parts
// it was built from.

use std::fmt;
use std::str::FromStr;

/// Separator used by every compound key the controller stores.
pub const SEPARATOR: char = '|';

const ESCAPE: char = '\\';

/// An ordered tuple of key components.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CompoundKey {
    parts: Vec<String>,
    separator: char,
}

impl CompoundKey {
    pub fn new<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_separator(parts, SEPARATOR)
    }

    pub fn with_separator<I, S>(parts: I, separator: char) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            parts: parts.into_iter().map(Into::into).collect(),
            separator,
        }
    }

    /// Split `text` on `separator`, honoring backslash escapes.
    ///
    /// An empty string is a key with one empty component, mirroring how a
    /// plain string split behaves.
    pub fn parse(text: &str, separator: char) -> Self {
        let mut parts = Vec::new();
        let mut current = String::new();
        let mut chars = text.chars();
        while let Some(c) = chars.next() {
            if c == ESCAPE {
                match chars.next() {
                    Some(next) => current.push(next),
                    None => current.push(ESCAPE),
                }
            } else if c == separator {
                parts.push(std::mem::take(&mut current));
            } else {
                current.push(c);
            }
        }
        parts.push(current);
        Self { parts, separator }
    }

    pub fn parts(&self) -> &[String] {
        &self.parts
    }

    pub fn into_parts(self) -> Vec<String> {
        self.parts
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.parts.get(index).map(String::as_str)
    }

    pub fn separator(&self) -> char {
        self.separator
    }

    /// Append one more component.
    pub fn push(&mut self, part: impl Into<String>) {
        self.parts.push(part.into());
    }
}

impl fmt::Display for CompoundKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, part) in self.parts.iter().enumerate() {
            if i > 0 {
                write!(f, "{}", self.separator)?;
            }
            for c in part.chars() {
                if c == self.separator || c == ESCAPE {
                    write!(f, "{ESCAPE}")?;
                }
                write!(f, "{c}")?;
            }
        }
        Ok(())
    }
}

impl FromStr for CompoundKey {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s, SEPARATOR))
    }
}
