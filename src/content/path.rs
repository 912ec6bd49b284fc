//! Dotted content paths.
//!
//! A path addresses one node of the content tree: `home.hero.title`,
//! `contact.email`, `home.features.1.description`. The first segment is the
//! section; segments made only of ASCII digits index into lists.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Path parse errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("content path is empty")]
    Empty,

    #[error("content path `{0}` has an empty segment")]
    EmptySegment(String),

    #[error("content path `{0}` contains whitespace")]
    Whitespace(String),

    #[error("content path `{0}` names a section but no field")]
    SectionOnly(String),

    #[error("content path `{0}` starts with a list index")]
    IndexedSection(String),
}

/// One step below the section.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    Field(String),
    Index(usize),
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Field(name) => f.write_str(name),
            Self::Index(i) => write!(f, "{i}"),
        }
    }
}

/// A validated path into the content tree.
///
/// Always has a section and at least one segment below it, so it can never
/// address the root or a whole section.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentPath {
    section: String,
    segments: Vec<Segment>,
}

impl ContentPath {
    pub fn parse(raw: &str) -> Result<Self, PathError> {
        if raw.is_empty() {
            return Err(PathError::Empty);
        }
        if raw.chars().any(char::is_whitespace) {
            return Err(PathError::Whitespace(raw.to_owned()));
        }

        let mut parts = raw.split('.');
        let section = parts.next().unwrap_or_default();
        if section.is_empty() {
            return Err(PathError::EmptySegment(raw.to_owned()));
        }
        if is_index(section) {
            return Err(PathError::IndexedSection(raw.to_owned()));
        }

        let mut segments = Vec::new();
        for part in parts {
            if part.is_empty() {
                return Err(PathError::EmptySegment(raw.to_owned()));
            }
            let segment = match part.parse::<usize>() {
                Ok(index) if is_index(part) => Segment::Index(index),
                _ => Segment::Field(part.to_owned()),
            };
            segments.push(segment);
        }

        if segments.is_empty() {
            return Err(PathError::SectionOnly(raw.to_owned()));
        }

        Ok(Self {
            section: section.to_owned(),
            segments,
        })
    }

    /// Top-level section key, the unit of persistence.
    pub fn section(&self) -> &str {
        &self.section
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }
}

fn is_index(part: &str) -> bool {
    !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit())
}

impl FromStr for ContentPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ContentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.section)?;
        for segment in &self.segments {
            write!(f, ".{segment}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_field_path() {
        let path = ContentPath::parse("home.hero.title").unwrap();
        assert_eq!(path.section(), "home");
        assert_eq!(
            path.segments(),
            &[
                Segment::Field("hero".into()),
                Segment::Field("title".into())
            ]
        );
    }

    #[test]
    fn test_parse_index_segment() {
        let path = ContentPath::parse("home.features.2.title").unwrap();
        assert_eq!(path.segments()[1], Segment::Index(2));
    }

    #[test]
    fn test_display_round_trips_text() {
        for raw in ["contact.email", "home.features.0.description", "financialPlanners.body"] {
            assert_eq!(ContentPath::parse(raw).unwrap().to_string(), raw);
        }
    }

    #[test]
    fn test_rejects_malformed_paths() {
        assert_eq!(ContentPath::parse(""), Err(PathError::Empty));
        assert!(matches!(
            ContentPath::parse("home"),
            Err(PathError::SectionOnly(_))
        ));
        assert!(matches!(
            ContentPath::parse("home..title"),
            Err(PathError::EmptySegment(_))
        ));
        assert!(matches!(
            ContentPath::parse(".title"),
            Err(PathError::EmptySegment(_))
        ));
        assert!(matches!(
            ContentPath::parse("home.hero."),
            Err(PathError::EmptySegment(_))
        ));
        assert!(matches!(
            ContentPath::parse("home.hero title"),
            Err(PathError::Whitespace(_))
        ));
        assert!(matches!(
            ContentPath::parse("0.title"),
            Err(PathError::IndexedSection(_))
        ));
    }

    #[test]
    fn test_signed_number_is_a_field() {
        let path = ContentPath::parse("home.+1").unwrap();
        assert_eq!(path.segments()[0], Segment::Field("+1".into()));
    }
}
