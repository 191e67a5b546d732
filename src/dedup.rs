//! Batch clustering of near-duplicate city spellings.
//!
//! Runs once over a fully resolved batch: count every distinct name, find the
//! names within edit distance of each other, and fold unambiguous pairs onto
//! the more frequent spelling.

use std::collections::{BTreeMap, HashMap, HashSet};

use strsim::levenshtein;
use tracing::{debug, info};

use crate::ingestion::ResolvedRecord;

/// Names shorter than this only match at distance 1.
pub const SHORT_NAME_LEN: usize = 10;
/// Largest distance accepted between long names.
pub const LONG_NAME_MAX_DISTANCE: usize = 3;

/// Occurrence counts of distinct city names, in first-seen order.
#[derive(Debug, Clone, Default)]
pub struct CityFrequencies {
    order: Vec<String>,
    counts: HashMap<String, usize>,
}

impl CityFrequencies {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, city: &str) {
        match self.counts.get_mut(city) {
            Some(count) => *count += 1,
            None => {
                self.order.push(city.to_string());
                self.counts.insert(city.to_string(), 1);
            }
        }
    }

    pub fn count(&self, city: &str) -> usize {
        self.counts.get(city).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.order
            .iter()
            .map(|city| (city.as_str(), self.count(city)))
    }
}

impl<'a> FromIterator<&'a str> for CityFrequencies {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        let mut frequencies = Self::new();
        for city in iter {
            frequencies.record(city);
        }
        frequencies
    }
}

/// Alias -> canonical spelling for one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DedupPlan {
    rewrites: HashMap<String, String>,
}

impl DedupPlan {
    pub fn canonical_for<'a>(&'a self, city: &'a str) -> &'a str {
        self.rewrites.get(city).map(String::as_str).unwrap_or(city)
    }

    pub fn rewrites(&self) -> &HashMap<String, String> {
        &self.rewrites
    }

    pub fn len(&self) -> usize {
        self.rewrites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rewrites.is_empty()
    }

    /// Rewrites the city of every record in place and returns how many
    /// records changed.
    pub fn apply(&self, records: &mut [ResolvedRecord]) -> usize {
        let mut changed = 0;
        for record in records.iter_mut() {
            if let Some(canonical) = self.rewrites.get(&record.city) {
                record.city = canonical.clone();
                changed += 1;
            }
        }
        changed
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Deduplicator;

impl Deduplicator {
    pub fn new() -> Self {
        Self
    }

    pub fn deduplicate(&self, mut records: Vec<ResolvedRecord>) -> Vec<ResolvedRecord> {
        let frequencies: CityFrequencies = records.iter().map(|r| r.city.as_str()).collect();
        let plan = self.plan(&frequencies);
        plan.apply(&mut records);
        records
    }

    pub fn plan(&self, frequencies: &CityFrequencies) -> DedupPlan {
        let names: Vec<(&str, usize)> = frequencies.iter().collect();
        let lengths: Vec<usize> = names.iter().map(|(name, _)| name.chars().count()).collect();

        let mut by_length: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (idx, len) in lengths.iter().enumerate() {
            by_length.entry(*len).or_default().push(idx);
        }

        let candidates: Vec<Vec<usize>> = (0..names.len())
            .map(|idx| {
                let len = lengths[idx];
                let max = max_distance(len);
                by_length
                    .range(len.saturating_sub(max)..=len + max)
                    .flat_map(|(_, bucket)| bucket.iter().copied())
                    .filter(|&other| other != idx)
                    .filter(|&other| is_close(len, levenshtein(names[idx].0, names[other].0)))
                    .collect()
            })
            .collect();

        let mut rewrites: HashMap<String, String> = HashMap::new();
        let mut canonicals: HashSet<usize> = HashSet::new();
        let mut aliased: HashSet<usize> = HashSet::new();

        for (idx, found) in candidates.iter().enumerate() {
            let [alt] = found.as_slice() else {
                continue;
            };
            let alt = *alt;
            // A candidate that is itself close to several names is ambiguous.
            if candidates[alt].iter().any(|&other| other != idx) {
                continue;
            }

            let (alias, canonical) = choose_canonical(idx, alt, &names, &canonicals);
            if canonicals.contains(&alias) || aliased.contains(&alias) || aliased.contains(&canonical)
            {
                continue;
            }

            debug!(
                alias = names[alias].0,
                alias_count = names[alias].1,
                canonical = names[canonical].0,
                canonical_count = names[canonical].1,
                "merging near-duplicate city"
            );
            rewrites.insert(names[alias].0.to_string(), names[canonical].0.to_string());
            aliased.insert(alias);
            canonicals.insert(canonical);
        }

        info!(
            distinct = names.len(),
            merged = rewrites.len(),
            "near-duplicate city analysis complete"
        );
        DedupPlan { rewrites }
    }
}

fn max_distance(len: usize) -> usize {
    if len < SHORT_NAME_LEN {
        1
    } else {
        LONG_NAME_MAX_DISTANCE
    }
}

fn is_close(len: usize, distance: usize) -> bool {
    distance != 0 && distance <= max_distance(len)
}

// Higher count wins. On a tie an existing canonical keeps its role, then the
// earlier-seen name wins.
fn choose_canonical(
    a: usize,
    b: usize,
    names: &[(&str, usize)],
    canonicals: &HashSet<usize>,
) -> (usize, usize) {
    let (count_a, count_b) = (names[a].1, names[b].1);
    if count_a != count_b {
        return if count_a > count_b { (b, a) } else { (a, b) };
    }
    match (canonicals.contains(&a), canonicals.contains(&b)) {
        (true, false) => (b, a),
        (false, true) => (a, b),
        _ if a < b => (b, a),
        _ => (a, b),
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn record(city: &str) -> ResolvedRecord {
        ResolvedRecord {
            title: String::new(),
            city: city.to_string(),
            department: "Bouches-du-Rhône".into(),
            region: "Provence-Alpes-Côte-d'Azur".into(),
            contract_type: "CDD".into(),
            contract_subtype: String::new(),
            duration: String::new(),
            duration_months: None,
            submission_date: NaiveDate::from_ymd_opt(2016, 1, 1).unwrap(),
        }
    }

    fn frequencies(pairs: &[(&str, usize)]) -> CityFrequencies {
        let mut freq = CityFrequencies::new();
        for (city, count) in pairs {
            for _ in 0..*count {
                freq.record(city);
            }
        }
        freq
    }

    #[test]
    fn folds_typo_onto_frequent_spelling() {
        let mut records: Vec<ResolvedRecord> = std::iter::repeat_with(|| record("Marseille"))
            .take(50)
            .collect();
        records.push(record("Marseile"));

        let deduped = Deduplicator::new().deduplicate(records);
        assert_eq!(deduped.len(), 51);
        assert!(deduped.iter().all(|r| r.city == "Marseille"));
    }

    #[test]
    fn frequent_spelling_wins_regardless_of_order() {
        let plan = Deduplicator::new().plan(&frequencies(&[("Marseile", 1), ("Marseille", 50)]));
        assert_eq!(plan.canonical_for("Marseile"), "Marseille");
        assert_eq!(plan.canonical_for("Marseille"), "Marseille");
        assert_eq!(plan.len(), 1);
    }

    #[test]
    fn ambiguous_neighbours_are_left_alone() {
        // "Lyons" and "Lyo" are both one edit from "Lyon" but two from each other.
        let plan = Deduplicator::new().plan(&frequencies(&[
            ("Lyon", 40),
            ("Lyons", 2),
            ("Lyo", 1),
        ]));
        assert!(plan.is_empty());

        // "Nantes" has two neighbours; "Nante" only sees "Nantes".
        let plan = Deduplicator::new().plan(&frequencies(&[
            ("Nante", 1),
            ("Nantes", 20),
            ("Mantes", 5),
        ]));
        assert!(plan.is_empty());
    }

    #[test]
    fn short_names_need_exact_distance_one() {
        let plan = Deduplicator::new().plan(&frequencies(&[("Rennes", 10), ("Vannes", 3)]));
        assert!(plan.is_empty());
        let plan = Deduplicator::new().plan(&frequencies(&[("Brest", 10), ("Breast", 1)]));
        assert_eq!(plan.canonical_for("Breast"), "Brest");
    }

    #[test]
    fn long_names_tolerate_three_edits() {
        let plan = Deduplicator::new().plan(&frequencies(&[
            ("Gif Sur Yvette", 30),
            ("Gif Sur Yvete", 2),
        ]));
        assert_eq!(plan.canonical_for("Gif Sur Yvete"), "Gif Sur Yvette");

        let plan = Deduplicator::new().plan(&frequencies(&[
            ("Villeurbanne", 9),
            ("Vileurbane", 1),
        ]));
        assert_eq!(plan.canonical_for("Vileurbane"), "Villeurbanne");

        let plan = Deduplicator::new().plan(&frequencies(&[
            ("Montpellier", 20),
            ("Mont Pelier X", 1),
        ]));
        assert!(plan.is_empty());
    }

    #[test]
    fn tie_keeps_first_seen_spelling() {
        let plan = Deduplicator::new().plan(&frequencies(&[("Grenoble", 3), ("Grenobl", 3)]));
        assert_eq!(plan.canonical_for("Grenobl"), "Grenoble");
        assert_eq!(plan.canonical_for("Grenoble"), "Grenoble");
    }

    // "Le Marseille" and "Marseille Ok" are each three edits from "Marseille"
    // and six from each other. "Marseille" is short, so it sees neither.
    #[test]
    fn tie_never_demotes_an_existing_canonical() {
        let plan = Deduplicator::new().plan(&frequencies(&[
            ("Le Marseille", 2),
            ("Marseille Ok", 4),
            ("Marseille", 4),
        ]));
        assert_eq!(plan.canonical_for("Le Marseille"), "Marseille");
        assert_eq!(plan.canonical_for("Marseille Ok"), "Marseille");
        assert_eq!(plan.canonical_for("Marseille"), "Marseille");
        assert_eq!(plan.len(), 2);
    }

    #[test]
    fn existing_canonical_is_not_folded_into_a_more_frequent_name() {
        let plan = Deduplicator::new().plan(&frequencies(&[
            ("Le Marseille", 2),
            ("Marseille Ok", 9),
            ("Marseille", 4),
        ]));
        assert_eq!(plan.canonical_for("Le Marseille"), "Marseille");
        assert_eq!(plan.canonical_for("Marseille"), "Marseille");
        assert_eq!(plan.canonical_for("Marseille Ok"), "Marseille Ok");
        assert_eq!(plan.len(), 1);
    }

    #[test]
    fn distinct_names_are_untouched() {
        let plan = Deduplicator::new().plan(&frequencies(&[
            ("Paris", 100),
            ("Lyon", 50),
            ("Toulouse", 20),
        ]));
        assert!(plan.is_empty());
        let mut records = vec![record("Paris"), record("Lyon")];
        assert_eq!(plan.apply(&mut records), 0);
    }

    #[test]
    fn frequencies_keep_first_seen_order() {
        let freq: CityFrequencies = ["Nice", "Lyon", "Nice"].into_iter().collect();
        let items: Vec<(&str, usize)> = freq.iter().collect();
        assert_eq!(items, vec![("Nice", 2), ("Lyon", 1)]);
    }
}
