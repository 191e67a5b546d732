use std::collections::HashMap;

const CANONICAL_REGIONS: &[(&[&str], &str)] = &[
    (&["haute normandie", "basse normandie"], "Normandie"),
    (
        &[
            "champagne ardenne",
            "alsace",
            "lorraine",
            "alsace champagne ardenne lorraine",
            "grand est",
        ],
        "Grand-Est",
    ),
    (
        &["bourgogne", "franche comté", "bourgogne franche comté"],
        "Bourgogne-Franche-Comté",
    ),
    (
        &["auvergne", "rhône alpes", "auvergne rhône alpes"],
        "Auvergne-Rhône-Alpes",
    ),
    (
        &[
            "aquitaine",
            "limousin",
            "poitou charentes",
            "aquitaine limousin poitou charentes",
            "nouvelle aquitaine",
        ],
        "Nouvelle-Aquitaine",
    ),
    (
        &[
            "languedoc roussillon",
            "midi pyrénées",
            "languedoc roussillon midi pyrénées",
        ],
        "Occitanie",
    ),
    (
        &[
            "nord pas de calais",
            "picardie",
            "nord pas de calais picardie",
            "hauts de france",
        ],
        "Hauts-de-France",
    ),
    (&["pays de la loire"], "Pays-de-la-Loire"),
    (&["centre", "centre val de loire"], "Centre-Val-de-Loire"),
    (
        &["provence alpes côte d'azur"],
        "Provence-Alpes-Côte-d'Azur",
    ),
    (&["île de france", "ile de france"], "Île-de-France"),
];

/// Maps historical region names onto the current administrative regions.
#[derive(Debug, Clone)]
pub struct RegionAliasTable {
    aliases: HashMap<String, String>,
}

impl Default for RegionAliasTable {
    fn default() -> Self {
        Self::from_groups(
            CANONICAL_REGIONS
                .iter()
                .map(|(aliases, canonical)| (aliases.iter().copied(), *canonical)),
        )
    }
}

impl RegionAliasTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_groups<'a, A>(groups: impl IntoIterator<Item = (A, &'a str)>) -> Self
    where
        A: IntoIterator<Item = &'a str>,
    {
        let mut aliases = HashMap::new();
        for (names, canonical) in groups {
            for name in names {
                aliases.insert(lookup_key(name), canonical.to_string());
            }
        }
        Self { aliases }
    }

    /// Returns the canonical region for `name`, or `name` itself when it is
    /// not a known alias.
    pub fn canonicalize_region(&self, name: &str) -> String {
        self.aliases
            .get(&lookup_key(name))
            .cloned()
            .unwrap_or_else(|| name.to_string())
    }

    pub fn aliases(&self) -> impl Iterator<Item = (&str, &str)> {
        self.aliases
            .iter()
            .map(|(alias, canonical)| (alias.as_str(), canonical.as_str()))
    }
}

fn lookup_key(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .replace('-', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_pre_reform_regions() {
        let table = RegionAliasTable::new();
        assert_eq!(table.canonicalize_region("Haute-Normandie"), "Normandie");
        assert_eq!(table.canonicalize_region("Rhône-Alpes"), "Auvergne-Rhône-Alpes");
        assert_eq!(table.canonicalize_region("Midi-Pyrénées"), "Occitanie");
        assert_eq!(table.canonicalize_region("ALSACE"), "Grand-Est");
        assert_eq!(table.canonicalize_region("Centre"), "Centre-Val-de-Loire");
        assert_eq!(
            table.canonicalize_region("Provence-Alpes-Côte d'Azur"),
            "Provence-Alpes-Côte-d'Azur"
        );
        assert_eq!(table.canonicalize_region("Île-de-France"), "Île-de-France");
    }

    #[test]
    fn maps_intermediate_reform_names() {
        let table = RegionAliasTable::new();
        assert_eq!(
            table.canonicalize_region("Alsace-Champagne-Ardenne-Lorraine"),
            "Grand-Est"
        );
        assert_eq!(
            table.canonicalize_region("Aquitaine-Limousin-Poitou-Charentes"),
            "Nouvelle-Aquitaine"
        );
        assert_eq!(
            table.canonicalize_region("Nord-Pas-de-Calais-Picardie"),
            "Hauts-de-France"
        );
    }

    #[test]
    fn every_alias_resolves_to_its_canonical_name() {
        let table = RegionAliasTable::new();
        let canonical: Vec<&str> = CANONICAL_REGIONS.iter().map(|(_, name)| *name).collect();
        let mut seen = 0;
        for (alias, expected) in table.aliases() {
            assert_eq!(table.canonicalize_region(alias), expected);
            assert_eq!(table.canonicalize_region(&alias.to_uppercase()), expected);
            assert!(canonical.contains(&expected));
            seen += 1;
        }
        assert!(seen > 20);
    }

    #[test]
    fn unknown_regions_pass_through() {
        let table = RegionAliasTable::new();
        assert_eq!(table.canonicalize_region("Bretagne"), "Bretagne");
        assert_eq!(table.canonicalize_region("Étranger"), "Étranger");
        assert_eq!(table.canonicalize_region(""), "");
        assert_eq!(table.canonicalize_region("Cambridgeshire"), "Cambridgeshire");
    }

    #[test]
    fn custom_groups() {
        let table = RegionAliasTable::from_groups([(["old name"], "New-Name")]);
        assert_eq!(table.canonicalize_region("Old-Name"), "New-Name");
    }
}
