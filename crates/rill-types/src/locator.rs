use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Segment value that matches any single segment at the same position.
pub const WILDCARD: &str = "*";

/// Opaque, URI-like address of one record (or a namespace of records) in a
/// backend.
///
/// The canonical form is `scheme://authority/segment/segment...`. Locators
/// are validated once on construction; equality, ordering and hashing are
/// all derived from the canonical string, so two locators built from the
/// same parts always compare equal.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Locator(String);

impl Locator {
    /// Create a root locator with no path segments.
    pub fn new(scheme: &str, authority: &str) -> Result<Self, TypeError> {
        let input = format!("{scheme}://{authority}");
        validate_scheme(scheme, &input)?;
        validate_authority(authority, &input)?;
        Ok(Self(input))
    }

    /// Parse a locator from its canonical string form.
    pub fn parse(input: &str) -> Result<Self, TypeError> {
        let (scheme, rest) = input.split_once("://").ok_or_else(|| TypeError::InvalidLocator {
            input: input.to_string(),
            reason: "missing \"://\" separator".into(),
        })?;
        validate_scheme(scheme, input)?;

        let (authority, path) = match rest.split_once('/') {
            Some((authority, path)) => (authority, Some(path)),
            None => (rest, None),
        };
        validate_authority(authority, input)?;

        if let Some(path) = path {
            for segment in path.split('/') {
                validate_segment(segment)?;
            }
        }
        Ok(Self(input.to_string()))
    }

    /// Return a new locator with `segment` appended to the path.
    pub fn join(&self, segment: &str) -> Result<Self, TypeError> {
        validate_segment(segment)?;
        Ok(Self(format!("{}/{segment}", self.0)))
    }

    /// The scheme part (`content` in `content://a/b`).
    pub fn scheme(&self) -> &str {
        self.parts().0
    }

    /// The authority part (`a` in `content://a/b`).
    pub fn authority(&self) -> &str {
        self.parts().1
    }

    /// Path segments in order.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.parts().2.split('/').filter(|s| !s.is_empty())
    }

    /// Number of path segments.
    pub fn depth(&self) -> usize {
        self.segments().count()
    }

    /// The final path segment, if any.
    pub fn last_segment(&self) -> Option<&str> {
        self.segments().last()
    }

    /// The locator with its final segment removed, or `None` for a root.
    pub fn parent(&self) -> Option<Self> {
        let idx = self.0.rfind('/')?;
        let parent = &self.0[..idx];
        // The "//" of the scheme separator is not a path boundary.
        if parent.ends_with(":/") {
            return None;
        }
        Some(Self(parent.to_string()))
    }

    /// Returns `true` if any segment is the wildcard.
    pub fn is_wildcard(&self) -> bool {
        self.segments().any(|s| s == WILDCARD)
    }

    /// Returns `true` if `other` is addressed by this locator, treating
    /// wildcard segments in `self` as "any value".
    ///
    /// Both locators must have the same depth. A concrete locator only
    /// matches itself.
    pub fn matches(&self, other: &Locator) -> bool {
        if self.scheme() != other.scheme() || self.authority() != other.authority() {
            return false;
        }
        if self.depth() != other.depth() {
            return false;
        }
        self.segments()
            .zip(other.segments())
            .all(|(pattern, seg)| pattern == WILDCARD || pattern == seg)
    }

    /// Returns `true` if `other` lies within the namespace rooted at `self`
    /// (including `self` itself).
    pub fn contains(&self, other: &Locator) -> bool {
        if self.scheme() != other.scheme() || self.authority() != other.authority() {
            return false;
        }
        if self.depth() > other.depth() {
            return false;
        }
        self.segments()
            .zip(other.segments())
            .all(|(prefix, seg)| prefix == WILDCARD || prefix == seg)
    }

    /// Canonical string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn parts(&self) -> (&str, &str, &str) {
        let (scheme, rest) = self.0.split_once("://").unwrap_or(("", self.0.as_str()));
        match rest.split_once('/') {
            Some((authority, path)) => (scheme, authority, path),
            None => (scheme, rest, ""),
        }
    }
}

fn validate_scheme(scheme: &str, input: &str) -> Result<(), TypeError> {
    let valid = scheme
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic())
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    if valid {
        Ok(())
    } else {
        Err(TypeError::InvalidLocator {
            input: input.to_string(),
            reason: format!("invalid scheme {scheme:?}"),
        })
    }
}

fn validate_authority(authority: &str, input: &str) -> Result<(), TypeError> {
    if authority.is_empty() || authority.contains('/') || authority.contains(char::is_whitespace) {
        return Err(TypeError::InvalidLocator {
            input: input.to_string(),
            reason: format!("invalid authority {authority:?}"),
        });
    }
    Ok(())
}

fn validate_segment(segment: &str) -> Result<(), TypeError> {
    if segment.is_empty()
        || segment.contains('/')
        || segment.contains(char::is_whitespace)
        || (segment.contains('*') && segment != WILDCARD)
    {
        return Err(TypeError::InvalidSegment(segment.to_string()));
    }
    Ok(())
}

impl fmt::Debug for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Locator({})", self.0)
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Locator {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Locator {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Locator> for String {
    fn from(locator: Locator) -> Self {
        locator.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn veggies() -> Locator {
        Locator::parse("content://test.authority/veggies").unwrap()
    }

    #[test]
    fn parse_and_display_roundtrip() {
        let loc = Locator::parse("content://test.authority/veggies/42").unwrap();
        assert_eq!(loc.to_string(), "content://test.authority/veggies/42");
        assert_eq!(loc.scheme(), "content");
        assert_eq!(loc.authority(), "test.authority");
        assert_eq!(loc.segments().collect::<Vec<_>>(), vec!["veggies", "42"]);
        assert_eq!(loc.last_segment(), Some("42"));
    }

    #[test]
    fn root_locator_has_no_segments() {
        let root = Locator::new("content", "test.authority").unwrap();
        assert_eq!(root.depth(), 0);
        assert_eq!(root.last_segment(), None);
        assert!(root.parent().is_none());
    }

    #[test]
    fn join_builds_equal_locators() {
        let a = veggies().join("7").unwrap();
        let b = Locator::parse("content://test.authority/veggies/7").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.parent(), Some(veggies()));
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(Locator::parse("no-separator").is_err());
        assert!(Locator::parse("://authority").is_err());
        assert!(Locator::parse("content://").is_err());
        assert!(Locator::parse("content://a//b").is_err());
        assert!(Locator::parse("content://a/b/").is_err());
        assert!(veggies().join("").is_err());
        assert!(veggies().join("a/b").is_err());
        assert!(veggies().join("pre*fix").is_err());
    }

    #[test]
    fn wildcard_matches_same_depth_only() {
        let pattern = veggies().join(WILDCARD).unwrap();
        assert!(pattern.is_wildcard());
        assert!(pattern.matches(&veggies().join("1").unwrap()));
        assert!(!pattern.matches(&veggies()));
        assert!(!pattern.matches(&veggies().join("1").unwrap().join("x").unwrap()));

        let other = Locator::parse("content://other/veggies/1").unwrap();
        assert!(!pattern.matches(&other));
    }

    #[test]
    fn concrete_locator_matches_only_itself() {
        let a = veggies().join("1").unwrap();
        let b = veggies().join("2").unwrap();
        assert!(a.matches(&a));
        assert!(!a.matches(&b));
    }

    #[test]
    fn namespace_containment() {
        let ns = veggies();
        assert!(ns.contains(&ns));
        assert!(ns.contains(&ns.join("1").unwrap()));
        assert!(!ns.join("1").unwrap().contains(&ns));
        assert!(!ns.contains(&Locator::parse("content://test.authority/fruit/1").unwrap()));
    }

    #[test]
    fn serde_uses_canonical_string() {
        let loc = veggies().join("3").unwrap();
        let json = serde_json::to_string(&loc).unwrap();
        assert_eq!(json, "\"content://test.authority/veggies/3\"");
        let parsed: Locator = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, loc);
        assert!(serde_json::from_str::<Locator>("\"bogus\"").is_err());
    }

    proptest! {
        #[test]
        fn join_then_parse_is_stable(seg in "[a-z0-9_-]{1,16}") {
            let joined = veggies().join(&seg).unwrap();
            let parsed = Locator::parse(joined.as_str()).unwrap();
            prop_assert_eq!(&joined, &parsed);
            prop_assert!(veggies().contains(&parsed));
            prop_assert_eq!(parsed.last_segment(), Some(seg.as_str()));
        }
    }
}
