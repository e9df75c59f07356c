//! Interest filters and their table records.

use crate::pending_interest::PendingInterestOrigin;
use bytes::Bytes;
use rust_ndnc_common::{Interest, Name, NdnError};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Declares which Interests a producer callback wants to receive: a name
/// prefix, optionally narrowed by a pattern over the remaining components.
///
/// The pattern is a sequence of `<component>` atoms; `<>` matches any one
/// component, and an atom may carry a `*` (zero or more) or `+` (one or
/// more) quantifier. `<>*` accepts any suffix.
#[derive(Clone)]
pub struct InterestFilter {
    prefix: Name,
    pattern: Option<SuffixPattern>,
    allows_loopback: bool,
}

impl InterestFilter {
    pub fn new(prefix: Name) -> Self {
        Self {
            prefix,
            pattern: None,
            allows_loopback: true,
        }
    }

    /// Builds a filter whose suffix components must match `pattern`.
    pub fn with_pattern(prefix: Name, pattern: &str) -> Result<Self, NdnError> {
        Ok(Self {
            prefix,
            pattern: Some(SuffixPattern::parse(pattern)?),
            allows_loopback: true,
        })
    }

    pub fn prefix(&self) -> &Name {
        &self.prefix
    }

    /// Whether Interests looped back from the same Face may match.
    pub fn allows_loopback(&self) -> bool {
        self.allows_loopback
    }

    pub fn set_allows_loopback(&mut self, on: bool) -> &mut Self {
        self.allows_loopback = on;
        self
    }

    /// Whether `name` falls under this filter.
    pub fn matches(&self, name: &Name) -> bool {
        if !self.prefix.is_prefix_of(name) {
            return false;
        }
        match &self.pattern {
            None => true,
            Some(pattern) => {
                let suffix: Vec<_> = name
                    .components()
                    .skip(self.prefix.len())
                    .cloned()
                    .collect();
                pattern.matches(&suffix)
            }
        }
    }
}

impl From<Name> for InterestFilter {
    fn from(prefix: Name) -> Self {
        Self::new(prefix)
    }
}

impl fmt::Display for InterestFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.prefix)?;
        if let Some(pattern) = &self.pattern {
            write!(f, "?{}", pattern.source)?;
        }
        Ok(())
    }
}

impl fmt::Debug for InterestFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InterestFilter({self})")
    }
}

#[derive(Clone)]
struct SuffixPattern {
    atoms: Vec<(Atom, Quantifier)>,
    source: String,
}

#[derive(Clone, PartialEq, Eq)]
enum Atom {
    Any,
    Literal(Bytes),
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Quantifier {
    One,
    ZeroOrMore,
    OneOrMore,
}

impl SuffixPattern {
    fn parse(source: &str) -> Result<Self, NdnError> {
        let mut atoms = Vec::new();
        let mut rest = source;
        while !rest.is_empty() {
            let Some(stripped) = rest.strip_prefix('<') else {
                return Err(NdnError::Packet(format!(
                    "invalid filter pattern '{source}': expected '<'"
                )));
            };
            let Some(end) = stripped.find('>') else {
                return Err(NdnError::Packet(format!(
                    "invalid filter pattern '{source}': unterminated '<'"
                )));
            };
            let atom = if end == 0 {
                Atom::Any
            } else {
                Atom::Literal(Bytes::copy_from_slice(stripped[..end].as_bytes()))
            };
            rest = &stripped[end + 1..];

            let quantifier = if let Some(r) = rest.strip_prefix('*') {
                rest = r;
                Quantifier::ZeroOrMore
            } else if let Some(r) = rest.strip_prefix('+') {
                rest = r;
                Quantifier::OneOrMore
            } else {
                Quantifier::One
            };
            atoms.push((atom, quantifier));
        }
        Ok(Self {
            atoms,
            source: source.to_owned(),
        })
    }

    fn matches(&self, components: &[rust_ndnc_common::Component]) -> bool {
        matches_from(&self.atoms, components)
    }
}

fn atom_matches(atom: &Atom, component: &rust_ndnc_common::Component) -> bool {
    match atom {
        Atom::Any => true,
        Atom::Literal(bytes) => component.is_generic() && component.value() == bytes,
    }
}

fn matches_from(atoms: &[(Atom, Quantifier)], components: &[rust_ndnc_common::Component]) -> bool {
    let Some(((atom, quantifier), rest_atoms)) = atoms.split_first() else {
        return components.is_empty();
    };

    match quantifier {
        Quantifier::One => match components.split_first() {
            Some((first, rest)) => atom_matches(atom, first) && matches_from(rest_atoms, rest),
            None => false,
        },
        Quantifier::ZeroOrMore | Quantifier::OneOrMore => {
            let min = if *quantifier == Quantifier::OneOrMore { 1 } else { 0 };
            let mut taken = 0;
            loop {
                if taken >= min && matches_from(rest_atoms, &components[taken..]) {
                    return true;
                }
                if taken >= components.len() || !atom_matches(atom, &components[taken]) {
                    return false;
                }
                taken += 1;
            }
        }
    }
}

pub(crate) type InterestCallback = Rc<RefCell<dyn FnMut(&InterestFilter, &Interest)>>;

/// A filter plus the application callback receiving matched Interests.
pub(crate) struct InterestFilterRecord {
    filter: InterestFilter,
    callback: InterestCallback,
}

impl InterestFilterRecord {
    pub(crate) fn new(filter: InterestFilter, callback: InterestCallback) -> Self {
        Self { filter, callback }
    }

    pub(crate) fn filter(&self) -> &InterestFilter {
        &self.filter
    }

    pub(crate) fn callback(&self) -> InterestCallback {
        Rc::clone(&self.callback)
    }

    /// Whether an Interest with the given origin may be dispatched here.
    pub(crate) fn does_match(&self, origin: PendingInterestOrigin, name: &Name) -> bool {
        (origin == PendingInterestOrigin::Forwarder || self.filter.allows_loopback())
            && self.filter.matches(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(uri: &str) -> Name {
        uri.parse().unwrap()
    }

    #[test]
    fn prefix_only_filter() {
        let filter = InterestFilter::new(name("/hello"));
        assert!(filter.matches(&name("/hello")));
        assert!(filter.matches(&name("/hello/world")));
        assert!(!filter.matches(&name("/bye/world")));
    }

    #[test]
    fn any_suffix_pattern() {
        let filter = InterestFilter::with_pattern(name("/hello"), "<>*").unwrap();
        assert!(filter.matches(&name("/hello")));
        assert!(filter.matches(&name("/hello/a/b/c")));
        assert!(!filter.matches(&name("/world")));
    }

    #[test]
    fn exact_suffix_pattern() {
        let filter = InterestFilter::with_pattern(name("/hello"), "<world>").unwrap();
        assert!(filter.matches(&name("/hello/world")));
        assert!(!filter.matches(&name("/hello")));
        assert!(!filter.matches(&name("/hello/world/extra")));
        assert!(!filter.matches(&name("/hello/mars")));
    }

    #[test]
    fn one_or_more_pattern() {
        let filter = InterestFilter::with_pattern(name("/a"), "<b><>+").unwrap();
        assert!(!filter.matches(&name("/a/b")));
        assert!(filter.matches(&name("/a/b/c")));
        assert!(filter.matches(&name("/a/b/c/d")));
    }

    #[test]
    fn malformed_patterns_rejected() {
        assert!(InterestFilter::with_pattern(name("/a"), "<b").is_err());
        assert!(InterestFilter::with_pattern(name("/a"), "b>").is_err());
    }
}
