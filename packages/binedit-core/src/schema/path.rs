//! Dot-delimited path expressions.
//!
//! The grammar is deliberately tiny: `.a.b.c` and `a[0].b` cover every
//! reference the schema language needs. A leading dot marks the path as
//! relative; resolution starts at the referencing field's parent scope and
//! searches outward through ancestors for the first segment.

use std::fmt;

use crate::error::PathError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Name(String),
    Index(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    pub relative: bool,
    pub segments: Vec<Segment>,
}

impl FieldPath {
    /// Parses a path expression. Empty paths and empty segments are
    /// rejected; indices must be bracketed decimal literals.
    pub fn parse(s: &str) -> Result<FieldPath, PathError> {
        let (relative, rest) = match s.strip_prefix('.') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        if rest.is_empty() {
            return Err(PathError::Malformed(s.to_string()));
        }

        let mut segments = Vec::new();
        for part in rest.split('.') {
            if part.is_empty() {
                return Err(PathError::Malformed(s.to_string()));
            }
            let (name, mut brackets) = match part.find('[') {
                Some(pos) => (&part[..pos], &part[pos..]),
                None => (part, ""),
            };
            if name.is_empty() {
                return Err(PathError::Malformed(s.to_string()));
            }
            segments.push(Segment::Name(name.to_string()));
            while !brackets.is_empty() {
                let close = brackets
                    .find(']')
                    .ok_or_else(|| PathError::Malformed(s.to_string()))?;
                let index: usize = brackets[1..close]
                    .parse()
                    .map_err(|_| PathError::Malformed(s.to_string()))?;
                segments.push(Segment::Index(index));
                brackets = &brackets[close + 1..];
                if !brackets.is_empty() && !brackets.starts_with('[') {
                    return Err(PathError::Malformed(s.to_string()));
                }
            }
        }
        Ok(FieldPath { relative, segments })
    }

    /// First segment name, used for the outward ancestor search.
    pub fn head(&self) -> Option<&str> {
        match self.segments.first() {
            Some(Segment::Name(n)) => Some(n),
            _ => None,
        }
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.relative {
            write!(f, ".")?;
        }
        let mut first = true;
        for seg in &self.segments {
            match seg {
                Segment::Name(n) => {
                    if !first {
                        write!(f, ".")?;
                    }
                    write!(f, "{}", n)?;
                }
                Segment::Index(i) => write!(f, "[{}]", i)?,
            }
            first = false;
        }
        Ok(())
    }
}
