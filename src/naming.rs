//! Save-name assignment for newly discovered items.
//!
//! A save name is the scraped title with the operator's literal substitutions
//! applied and made safe as a single file name, plus an occurrence number when
//! the same base name was seen before: the first "Episode" stays `Episode`,
//! the second becomes `Episode2`, the third `Episode3`. Occurrences are
//! counted per base name, seeded from the catalog at the start of a discovery
//! run, and a name already held by a cataloged record is never handed out.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::catalog::CatalogRecord;

/// Ordered table of literal `from -> to` replacements.
///
/// Deserializes from a JSON object; entries keep the order they have in the
/// file and are applied one after another.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Substitutions(Vec<(String, String)>);

impl Substitutions {
    /// Builds a table from ordered pairs.
    pub fn new<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self(
            pairs
                .into_iter()
                .map(|(from, to)| (from.into(), to.into()))
                .collect(),
        )
    }

    /// Applies every replacement in order. Empty patterns are ignored.
    #[must_use]
    pub fn apply(&self, name: &str) -> String {
        self.0
            .iter()
            .filter(|(from, _)| !from.is_empty())
            .fold(name.to_string(), |acc, (from, to)| acc.replace(from, to))
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true when the table has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates the entries in application order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(from, to)| (from.as_str(), to.as_str()))
    }
}

impl Serialize for Substitutions {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (from, to) in &self.0 {
            map.serialize_entry(from, to)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Substitutions {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct OrderedPairs;

        impl<'de> Visitor<'de> for OrderedPairs {
            type Value = Substitutions;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an object of string replacements")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut pairs = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((from, to)) = access.next_entry::<String, String>()? {
                    pairs.push((from, to));
                }
                Ok(Substitutions(pairs))
            }
        }

        deserializer.deserialize_map(OrderedPairs)
    }
}

/// Makes `name` usable as one file name inside the download directory.
///
/// Path separators, characters reserved on common filesystems and control
/// characters become `_`. Surrounding whitespace is trimmed. Names made only
/// of dots (`.`, `..`) and empty names are replaced so they can never address
/// a directory.
#[must_use]
pub fn sanitize_save_name(name: &str) -> String {
    let sanitized: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if sanitized.is_empty() {
        "_".to_string()
    } else if sanitized.chars().all(|c| c == '.') {
        sanitized.replace('.', "_")
    } else {
        sanitized
    }
}

/// Base name shared by every occurrence of `origin_name`.
fn base_name(origin_name: &str, substitutions: &Substitutions) -> String {
    sanitize_save_name(&substitutions.apply(origin_name))
}

/// Computes a save name from a title and how many times its base name was
/// already seen.
///
/// `seen_before == 0` returns the substituted, sanitized title unchanged;
/// otherwise the occurrence number (`seen_before + 1`) is appended without a
/// separator.
#[must_use]
pub fn resolve_save_name(origin_name: &str, seen_before: usize, substitutions: &Substitutions) -> String {
    let base = base_name(origin_name, substitutions);
    if seen_before == 0 {
        base
    } else {
        format!("{base}{}", seen_before + 1)
    }
}

/// Run-scoped save-name allocator.
#[derive(Debug, Clone, Default)]
pub struct NameResolver {
    substitutions: Substitutions,
    occurrences: HashMap<String, usize>,
    taken: HashSet<String>,
}

impl NameResolver {
    /// Creates a resolver with no prior occurrences.
    #[must_use]
    pub fn new(substitutions: Substitutions) -> Self {
        Self {
            substitutions,
            occurrences: HashMap::new(),
            taken: HashSet::new(),
        }
    }

    /// Creates a resolver seeded with the records already in the catalog.
    ///
    /// Each record counts one occurrence of its title's base name, and its
    /// stored save name is reserved.
    #[must_use]
    pub fn from_records<'a, I>(records: I, substitutions: Substitutions) -> Self
    where
        I: IntoIterator<Item = &'a CatalogRecord>,
    {
        let mut resolver = Self::new(substitutions);
        for record in records {
            let base = base_name(&record.origin_name, &resolver.substitutions);
            *resolver.occurrences.entry(base).or_insert(0) += 1;
            resolver.taken.insert(record.save_name.clone());
        }
        resolver
    }

    /// Returns how many times the base name of `origin_name` has been counted.
    #[must_use]
    pub fn occurrences(&self, origin_name: &str) -> usize {
        self.occurrences
            .get(&base_name(origin_name, &self.substitutions))
            .copied()
            .unwrap_or(0)
    }

    /// Allocates the next free save name for `origin_name` and counts it.
    ///
    /// Occurrence numbers already held by another record are skipped.
    pub fn resolve(&mut self, origin_name: &str) -> String {
        let base = base_name(origin_name, &self.substitutions);
        let count = self.occurrences.entry(base.clone()).or_insert(0);
        loop {
            let name = if *count == 0 {
                base.clone()
            } else {
                format!("{base}{}", *count + 1)
            };
            *count += 1;
            if self.taken.insert(name.clone()) {
                return name;
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::catalog::sample_record;

    #[test]
    fn test_first_occurrence_has_no_suffix() {
        let mut resolver = NameResolver::new(Substitutions::default());
        assert_eq!(resolver.resolve("Episode"), "Episode");
    }

    #[test]
    fn test_nth_occurrence_suffix_equals_n() {
        let mut resolver = NameResolver::new(Substitutions::default());
        let names: Vec<String> = (0..4).map(|_| resolver.resolve("X")).collect();
        assert_eq!(names, vec!["X", "X2", "X3", "X4"]);
    }

    #[test]
    fn test_counts_seeded_from_catalog() {
        let existing = vec![sample_record(1, "X"), sample_record(2, "X")];
        let mut resolver = NameResolver::from_records(&existing, Substitutions::default());

        assert_eq!(resolver.occurrences("X"), 2);
        let name = resolver.resolve("X");
        assert!(name.ends_with('3'), "got {name}");
        assert_eq!(name, "X3");
    }

    #[test]
    fn test_substitution_applied_before_suffix() {
        let subs = Substitutions::new([("Show ", "")]);
        let mut resolver = NameResolver::new(subs);
        assert_eq!(resolver.resolve("Show B"), "B");
        assert_eq!(resolver.resolve("Show B"), "B2");
    }

    #[test]
    fn test_substitutions_apply_sequentially_and_literally() {
        let subs = Substitutions::new([("a.b", "c"), ("c", "d")]);
        assert_eq!(subs.apply("a.b axb"), "d axb");
    }

    #[test]
    fn test_empty_pattern_is_ignored() {
        let subs = Substitutions::new([("", "-")]);
        assert_eq!(subs.apply("abc"), "abc");
    }

    #[test]
    fn test_titles_that_substitute_to_one_name_are_numbered() {
        let subs = Substitutions::new([("第1集", ""), ("第2集", "")]);
        let mut resolver = NameResolver::new(subs);
        assert_eq!(resolver.resolve("戏第1集"), "戏");
        assert_eq!(resolver.resolve("戏第2集"), "戏2");
    }

    #[test]
    fn test_seeding_counts_substituted_titles() {
        let subs = Substitutions::new([("第1集", ""), ("第2集", "")]);
        let mut existing = sample_record(1, "戏");
        existing.origin_name = "戏第1集".into();

        let mut resolver = NameResolver::from_records(&[existing], subs);
        assert_eq!(resolver.occurrences("戏第2集"), 1);
        assert_eq!(resolver.resolve("戏第2集"), "戏2");
    }

    #[test]
    fn test_never_reuses_a_cataloged_save_name() {
        // A title literally named "X2" already holds the name the second "X" would get.
        let records = vec![sample_record(1, "X"), sample_record(2, "X2")];
        let mut resolver = NameResolver::from_records(&records, Substitutions::default());

        assert_eq!(resolver.resolve("X"), "X3");
        assert_eq!(resolver.resolve("X2"), "X22");
    }

    #[test]
    fn test_path_separators_are_replaced() {
        let mut resolver = NameResolver::new(Substitutions::default());
        assert_eq!(resolver.resolve("A/B"), "A_B");
        assert_eq!(resolver.resolve("C\\D"), "C_D");
        assert_eq!(resolver.resolve("../escaped"), ".._escaped");
    }

    #[test]
    fn test_dot_names_cannot_address_a_directory() {
        assert_eq!(sanitize_save_name(".."), "__");
        assert_eq!(sanitize_save_name("."), "_");
    }

    #[test]
    fn test_empty_title_gets_placeholder() {
        let mut resolver = NameResolver::new(Substitutions::default());
        assert_eq!(resolver.resolve(""), "_");
        assert_eq!(resolver.resolve("   "), "_2");
    }

    #[test]
    fn test_reserved_and_control_characters_are_replaced() {
        assert_eq!(sanitize_save_name("a:b*c?\"d<e>f|g\u{7}h"), "a_b_c__d_e_f_g_h");
    }

    #[test]
    fn test_substitution_can_empty_a_title() {
        let subs = Substitutions::new([("Trailer", "")]);
        assert_eq!(resolve_save_name("Trailer", 0, &subs), "_");
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let subs = Substitutions::new([("《", ""), ("》", "")]);
        let records = vec![sample_record(1, "《A》")];
        let mut first = NameResolver::from_records(&records, subs.clone());
        let mut second = NameResolver::from_records(&records, subs);
        assert_eq!(first.resolve("《A》"), second.resolve("《A》"));
        assert_eq!(resolve_save_name("《A》", 1, &Substitutions::new([("《", "")])), "A》2");
    }

    #[test]
    fn test_substitutions_deserialize_in_file_order() {
        let subs: Substitutions =
            serde_json::from_str(r#"{"z": "1", "a": "2", "m": "3"}"#).unwrap();
        let keys: Vec<&str> = subs.iter().map(|(from, _)| from).collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
        assert_eq!(subs.len(), 3);
    }

    #[test]
    fn test_substitutions_serialize_round_trip_keeps_order() {
        let subs = Substitutions::new([("b", "1"), ("a", "2")]);
        let json = serde_json::to_string(&subs).unwrap();
        assert_eq!(json, r#"{"b":"1","a":"2"}"#);
    }
}
