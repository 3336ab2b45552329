//! Canonical location names.
//!
//! Each scope has a fixed dictionary translating publisher spellings to the
//! names used by the boundary geometry and the population tables. No target
//! name is itself a source spelling, so canonicalisation is idempotent.

use std::borrow::Cow;

use crate::models::Scope;

/// Publisher country spellings → boundary-geometry country names.
const WORLD_NAMES: &[(&str, &str)] = &[
    ("Bahamas", "The Bahamas"),
    ("Burma", "Myanmar"),
    ("Congo (Brazzaville)", "Republic of the Congo"),
    ("Congo (Kinshasa)", "Democratic Republic of the Congo"),
    ("Cote d'Ivoire", "Ivory Coast"),
    ("Czechia", "Czech Republic"),
    ("Guinea-Bissau", "Guinea Bissau"),
    ("Korea, South", "South Korea"),
    ("North Macedonia", "Macedonia"),
    ("Serbia", "Republic of Serbia"),
    ("Eswatini", "Swaziland"),
    ("Timor-Leste", "East Timor"),
    ("Taiwan*", "Taiwan"),
    ("Tanzania", "United Republic of Tanzania"),
    ("US", "United States of America"),
    ("West Bank and Gaza", "West Bank"),
];

/// State names already match the geometry; county codes are normalised
/// numerically, not by name.
const NO_NAMES: &[(&str, &str)] = &[];

/// The scope's fixed spelling dictionary.
#[derive(Debug, Clone, Copy)]
pub struct CanonicalNameMap {
    pairs: &'static [(&'static str, &'static str)],
}

impl CanonicalNameMap {
    pub fn for_scope(scope: Scope) -> Self {
        let pairs = match scope {
            Scope::World => WORLD_NAMES,
            Scope::Usa | Scope::UsCounties => NO_NAMES,
        };
        Self { pairs }
    }

    pub fn lookup(&self, name: &str) -> Option<&'static str> {
        self.pairs
            .iter()
            .find(|(from, _)| *from == name)
            .map(|(_, to)| *to)
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Translate `name` to its canonical spelling for `scope`; unmapped names
/// pass through unchanged.
pub fn canonicalize(name: &str, scope: Scope) -> Cow<'_, str> {
    match CanonicalNameMap::for_scope(scope).lookup(name) {
        Some(canonical) => Cow::Borrowed(canonical),
        None => Cow::Borrowed(name),
    }
}
