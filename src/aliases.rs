//! Rewrites a normalized city name into a form the geocoder understands.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

/// Marks the boundary between alternative cities ("Rennes ou Toulouse").
pub const SEPARATOR: char = '|';

const SEPARATOR_STR: &str = "|";

// Keys are lowercase whole-word phrases.
const DEFAULT_ALIASES: &[(&str, &str)] = &[
    ("ou", SEPARATOR_STR),
    ("or", SEPARATOR_STR),
    ("et", SEPARATOR_STR),
    ("and", SEPARATOR_STR),
    ("puis", SEPARATOR_STR),
    ("/mer", " Sur Mer"),
    ("cedex", ""),
    ("plateau de saclay", "Saclay"),
    ("université paris saclay", "Saclay"),
    ("génopôle d'evry", "Evry"),
    ("ile de france", "Paris"),
    ("île de france", "Paris"),
    ("île de", "Paris"),
    ("paris région parisienne", "Paris"),
    ("région parisienne", "Paris"),
    ("france", "Paris"),
    ("montpelllier", "Montpellier"),
    ("cambridege", "Cambridge"),
    ("evry orsay", "Evry"),
    ("lyon evry", "Lyon"),
    ("marseille nice", "Marseille"),
    ("lyon villeurbanne", "Lyon"),
    ("clermont fd", "Clermont Ferrand"),
    ("hinxton cambridge", "Hinxton"),
    ("hinxton cambridge uk", "Hinxton"),
    ("bordeaux cestas", "Bordeaux"),
    ("montpellier perpignan", "Montpellier"),
    ("nice sophia antipolis", "Nice"),
];

static REPEATED_PARIS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bParis(?:\s+Paris)+\b").expect("paris pattern compiles"));

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace pattern"));

/// Phrase substitution table applied as a single alternation regex.
#[derive(Debug, Clone)]
pub struct GeocoderAliasRewriter {
    replacements: HashMap<String, String>,
    pattern: Regex,
}

impl Default for GeocoderAliasRewriter {
    fn default() -> Self {
        Self::from_pairs(DEFAULT_ALIASES.iter().copied())
            .expect("built-in alias table compiles")
    }
}

impl GeocoderAliasRewriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<'a>(
        pairs: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Result<Self, regex::Error> {
        let replacements: HashMap<String, String> = pairs
            .into_iter()
            .map(|(phrase, replacement)| (phrase.to_lowercase(), replacement.to_string()))
            .collect();

        // Longest phrase first so "hinxton cambridge uk" wins over "hinxton cambridge".
        let mut keys: Vec<&String> = replacements.keys().collect();
        keys.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()).then(a.cmp(b)));
        let alternation = keys
            .iter()
            .map(|key| regex::escape(key))
            .collect::<Vec<_>>()
            .join("|");
        let pattern = Regex::new(&format!(r"(?i)\b(?:{alternation})\b"))?;

        Ok(Self {
            replacements,
            pattern,
        })
    }

    /// Returns the geocoder-ready form of `name`, keeping only the first city
    /// when several are named.
    pub fn rewrite(&self, name: &str) -> String {
        let substituted = self.pattern.replace_all(name, |caps: &regex::Captures<'_>| {
            let matched = &caps[0];
            self.replacements
                .get(&matched.to_lowercase())
                .cloned()
                .unwrap_or_else(|| matched.to_string())
        });
        let collapsed = REPEATED_PARIS.replace_all(&substituted, "Paris");
        let separated = collapsed.replace('/', SEPARATOR_STR);
        let first = separated.split(SEPARATOR).next().unwrap_or_default();
        let rewritten = WHITESPACE.replace_all(first, " ").trim().to_string();
        if rewritten.is_empty() {
            debug!(name, "alias rewrite left no city name");
        }
        rewritten
    }

    pub fn len(&self) -> usize {
        self.replacements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.replacements.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_first_alternative() {
        let rewriter = GeocoderAliasRewriter::new();
        assert_eq!(rewriter.rewrite("Rennes Ou Toulouse"), "Rennes");
        assert_eq!(rewriter.rewrite("Evry Puis Saclay En"), "Evry");
        assert_eq!(rewriter.rewrite("Paris/Ivry Sur Seine"), "Paris");
        assert_eq!(rewriter.rewrite("Lille And Paris"), "Lille");
    }

    #[test]
    fn maps_known_aliases() {
        let rewriter = GeocoderAliasRewriter::new();
        assert_eq!(rewriter.rewrite("Montpelllier"), "Montpellier");
        assert_eq!(rewriter.rewrite("Clermont Fd"), "Clermont Ferrand");
        assert_eq!(rewriter.rewrite("Hinxton Cambridge Uk"), "Hinxton");
        assert_eq!(rewriter.rewrite("Nice Sophia Antipolis"), "Nice");
        assert_eq!(rewriter.rewrite("Villefranche/Mer"), "Villefranche Sur Mer");
        assert_eq!(rewriter.rewrite("Génopôle D'Evry"), "Evry");
        assert_eq!(rewriter.rewrite("Université Paris Saclay"), "Saclay");
    }

    #[test]
    fn collapses_paris_hints() {
        let rewriter = GeocoderAliasRewriter::new();
        assert_eq!(rewriter.rewrite("Paris Cedex"), "Paris");
        assert_eq!(rewriter.rewrite("Région Parisienne"), "Paris");
        assert_eq!(rewriter.rewrite("Île De France"), "Paris");
        assert_eq!(rewriter.rewrite("Paris Région Parisienne"), "Paris");
        assert_eq!(rewriter.rewrite("Paris France"), "Paris");
    }

    #[test]
    fn paris_collapse_respects_word_boundaries() {
        let rewriter = GeocoderAliasRewriter::new();
        assert_eq!(rewriter.rewrite("Paris Paris"), "Paris");
        assert_eq!(rewriter.rewrite("Paris Parisis"), "Paris Parisis");
        assert_eq!(rewriter.rewrite("Cormeilles Paris Parisis"), "Cormeilles Paris Parisis");
    }

    #[test]
    fn separator_or_filler_alone_yields_empty_name() {
        let rewriter = GeocoderAliasRewriter::new();
        assert_eq!(rewriter.rewrite("Cedex"), "");
        assert_eq!(rewriter.rewrite("Et Lyon"), "");
    }

    #[test]
    fn leaves_plain_names_alone() {
        let rewriter = GeocoderAliasRewriter::new();
        assert_eq!(rewriter.rewrite("Evry"), "Evry");
        assert_eq!(rewriter.rewrite("Orsay"), "Orsay");
        assert_eq!(rewriter.rewrite("Etampes"), "Etampes");
        assert_eq!(rewriter.rewrite("  Gif Sur Yvette "), "Gif Sur Yvette");
    }

    #[test]
    fn custom_table_is_case_insensitive() {
        let rewriter =
            GeocoderAliasRewriter::from_pairs([("Strasbourg Illkirch", "Illkirch")]).unwrap();
        assert_eq!(rewriter.len(), 1);
        assert_eq!(rewriter.rewrite("STRASBOURG illkirch"), "Illkirch");
    }
}
