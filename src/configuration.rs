//! Configuration model: concrete test configurations, the host-supplied
//! configuration domain, and the conversion between specifier tokens and sets
//! of concrete configurations.
//!
//! A concrete configuration is an (OS version, architecture, build type)
//! triple. Specifier tokens written in an expectations file select a subset of
//! the domain: values mentioned for an axis restrict that axis, axes not
//! mentioned match everything, and macros ("win") expand to several values of
//! one axis. The converter also runs the other direction, producing an exact
//! minimal covering token list for an arbitrary configuration set, which is
//! what keeps serialization round-trip safe.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ============================================================================
// CONCRETE CONFIGURATIONS
// ============================================================================

/// The three configuration axes, in canonical (human-readable) order. The
/// order doubles as the specifier sort priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Axis {
    Version,
    Architecture,
    BuildType,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::Version, Axis::Architecture, Axis::BuildType];

    pub fn name(self) -> &'static str {
        match self {
            Axis::Version => "version",
            Axis::Architecture => "architecture",
            Axis::BuildType => "build_type",
        }
    }

    fn index(self) -> usize {
        match self {
            Axis::Version => 0,
            Axis::Architecture => 1,
            Axis::BuildType => 2,
        }
    }
}

/// One fully-specified configuration. Two configurations are equal iff all
/// three fields match. Axis values are lowercase by convention.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TestConfiguration {
    pub version: String,
    pub architecture: String,
    pub build_type: String,
}

impl TestConfiguration {
    pub fn new(
        version: impl Into<String>,
        architecture: impl Into<String>,
        build_type: impl Into<String>,
    ) -> Self {
        Self {
            version: version.into(),
            architecture: architecture.into(),
            build_type: build_type.into(),
        }
    }

    pub fn value(&self, axis: Axis) -> &str {
        match axis {
            Axis::Version => &self.version,
            Axis::Architecture => &self.architecture,
            Axis::BuildType => &self.build_type,
        }
    }

    /// The three values in axis order.
    pub fn values(&self) -> [&str; 3] {
        [&self.version, &self.architecture, &self.build_type]
    }
}

impl fmt::Display for TestConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.version, self.architecture, self.build_type)
    }
}

impl FromStr for TestConfiguration {
    type Err = String;

    /// Parses the `version-architecture-buildtype` form used on the command
    /// line, e.g. `xp-x86-release`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('-').collect();
        if parts.len() != 3 || parts.iter().any(|p| p.is_empty()) {
            return Err(format!("expected a version-architecture-buildtype triple, got \"{s}\""));
        }
        Ok(TestConfiguration::new(parts[0], parts[1], parts[2]))
    }
}

// ============================================================================
// CONFIGURATION DOMAIN
// ============================================================================

/// The host-supplied enumeration of axis values and specifier macros.
///
/// Axis values are kept in declaration order; that order is the host's
/// specifier sort order used for canonical serialization. The full domain is
/// the Cartesian product of the three axes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigurationDomain {
    versions: Vec<String>,
    architectures: Vec<String>,
    build_types: Vec<String>,
    #[serde(default)]
    macros: BTreeMap<String, Vec<String>>,
}

impl ConfigurationDomain {
    pub fn new<S: Into<String>>(
        versions: impl IntoIterator<Item = S>,
        architectures: impl IntoIterator<Item = S>,
        build_types: impl IntoIterator<Item = S>,
    ) -> Self {
        Self {
            versions: versions.into_iter().map(Into::into).collect(),
            architectures: architectures.into_iter().map(Into::into).collect(),
            build_types: build_types.into_iter().map(Into::into).collect(),
            macros: BTreeMap::new(),
        }
    }

    /// Registers a specifier macro. Expansion is single-level: a macro maps
    /// directly to axis values, never to other macros.
    pub fn with_macro<S: Into<String>>(
        mut self,
        name: impl Into<String>,
        values: impl IntoIterator<Item = S>,
    ) -> Self {
        self.macros.insert(name.into(), values.into_iter().map(Into::into).collect());
        self
    }

    pub fn axis_values(&self, axis: Axis) -> &[String] {
        match axis {
            Axis::Version => &self.versions,
            Axis::Architecture => &self.architectures,
            Axis::BuildType => &self.build_types,
        }
    }

    pub fn macros(&self) -> &BTreeMap<String, Vec<String>> {
        &self.macros
    }

    /// The full configuration domain: the Cartesian product of the axes,
    /// computed once per converter.
    pub fn all_configurations(&self) -> BTreeSet<TestConfiguration> {
        let mut all = BTreeSet::new();
        for version in &self.versions {
            for architecture in &self.architectures {
                for build_type in &self.build_types {
                    all.insert(TestConfiguration::new(version, architecture, build_type));
                }
            }
        }
        all
    }
}

impl Default for ConfigurationDomain {
    /// The classic desktop port domain. Hosts with other platforms supply
    /// their own domain, typically deserialized from a port description file.
    fn default() -> Self {
        ConfigurationDomain::new(
            ["xp", "vista", "win7", "snowleopard", "lion", "mountainlion", "lucid"],
            ["x86", "x86_64"],
            ["debug", "release"],
        )
        .with_macro("win", ["xp", "vista", "win7"])
        .with_macro("mac", ["snowleopard", "lion", "mountainlion"])
        .with_macro("linux", ["lucid"])
    }
}

// ============================================================================
// SPECIFIER SORTER
// ============================================================================

/// Orders specifier tokens the way the host declares them: by axis priority
/// (version, architecture, build type), then by declaration order within the
/// axis. Macros sort at the position of their first expanded value.
#[derive(Debug, Clone)]
pub struct SpecifierSorter {
    priorities: BTreeMap<String, (usize, usize)>,
}

impl SpecifierSorter {
    pub fn new(domain: &ConfigurationDomain) -> Self {
        let mut priorities = BTreeMap::new();
        for axis in Axis::ALL {
            for (index, value) in domain.axis_values(axis).iter().enumerate() {
                priorities.insert(value.clone(), (axis.index(), index));
            }
        }
        for (name, values) in domain.macros() {
            if let Some(first) = values.first() {
                if let Some(&priority) = priorities.get(first) {
                    priorities.insert(name.clone(), priority);
                }
            }
        }
        Self { priorities }
    }

    fn sort_key(&self, specifier: &str) -> (usize, usize, String) {
        let lower = specifier.to_lowercase();
        let (axis, index) = self.priorities.get(&lower).copied().unwrap_or((usize::MAX, 0));
        (axis, index, lower)
    }

    /// Sorts tokens in place. Unknown tokens sort after all known ones, by
    /// name, so output stays deterministic.
    pub fn sort_specifiers(&self, specifiers: &mut [String]) {
        specifiers.sort_by_key(|s| self.sort_key(s));
    }
}

// ============================================================================
// CONVERTER
// ============================================================================

/// Converts between specifier token sets and sets of concrete configurations.
#[derive(Debug, Clone)]
pub struct ConfigurationConverter {
    all_configurations: BTreeSet<TestConfiguration>,
    axis_value_sets: [BTreeSet<String>; 3],
    value_to_axis: BTreeMap<String, Axis>,
    macros: BTreeMap<String, Vec<String>>,
    sorter: SpecifierSorter,
}

impl ConfigurationConverter {
    pub fn new(domain: &ConfigurationDomain) -> Self {
        let mut value_to_axis = BTreeMap::new();
        let mut axis_value_sets: [BTreeSet<String>; 3] = Default::default();
        for axis in Axis::ALL {
            for value in domain.axis_values(axis) {
                value_to_axis.insert(value.clone(), axis);
                axis_value_sets[axis.index()].insert(value.clone());
            }
        }
        Self {
            all_configurations: domain.all_configurations(),
            axis_value_sets,
            value_to_axis,
            macros: domain.macros().clone(),
            sorter: SpecifierSorter::new(domain),
        }
    }

    pub fn sorter(&self) -> &SpecifierSorter {
        &self.sorter
    }

    pub fn all_configurations(&self) -> &BTreeSet<TestConfiguration> {
        &self.all_configurations
    }

    /// Converts specifier tokens into the set of concrete configurations they
    /// select.
    ///
    /// No specifiers at all matches the whole domain. Tokens that belong to no
    /// axis are legal, opaque specifiers (typically platforms another port
    /// builds); a line mentioning one simply never matches any configuration
    /// here, so the result is empty. No warning is recorded for them.
    pub fn to_config_set(&self, specifiers: &[String]) -> BTreeSet<TestConfiguration> {
        if specifiers.is_empty() {
            return self.all_configurations.clone();
        }

        let mut mentioned: BTreeMap<Axis, BTreeSet<&str>> = BTreeMap::new();
        for specifier in specifiers {
            let lower = specifier.to_lowercase();
            let expanded: Vec<String> = match self.macros.get(&lower) {
                Some(values) => values.clone(),
                None => vec![lower],
            };
            for value in &expanded {
                match self.value_to_axis.get(value) {
                    Some(&axis) => {
                        // Borrow the domain's own copy so the set can outlive
                        // the expansion temporary.
                        if let Some(owned) = self.axis_value_sets[axis.index()].get(value) {
                            mentioned.entry(axis).or_default().insert(owned.as_str());
                        }
                    }
                    None => return BTreeSet::new(),
                }
            }
        }

        self.all_configurations
            .iter()
            .filter(|config| {
                mentioned.iter().all(|(&axis, values)| values.contains(config.value(axis)))
            })
            .cloned()
            .collect()
    }

    /// Converts a configuration set back into a minimal covering list of
    /// specifier-token combinations.
    ///
    /// The conversion is exact: the union of [`to_config_set`] over the
    /// returned combinations reproduces the input set, member for member. The
    /// full domain yields a single empty combination; the empty set yields no
    /// combinations at all.
    ///
    /// [`to_config_set`]: ConfigurationConverter::to_config_set
    pub fn to_specifiers_list(&self, configs: &BTreeSet<TestConfiguration>) -> Vec<Vec<String>> {
        if configs.is_empty() {
            return Vec::new();
        }
        if *configs == self.all_configurations {
            return vec![Vec::new()];
        }

        // Each cell covers the Cartesian product of its three value sets.
        // Cells start as singleton triples and stay pairwise disjoint, so
        // every merge preserves the union exactly.
        let mut cells: Vec<[BTreeSet<String>; 3]> = configs
            .iter()
            .map(|config| {
                [
                    single(config.version.clone()),
                    single(config.architecture.clone()),
                    single(config.build_type.clone()),
                ]
            })
            .collect();

        loop {
            let Some((i, j, axis)) = find_merge(&cells) else {
                break;
            };
            let other = cells.remove(j);
            let values: Vec<String> = other[axis].iter().cloned().collect();
            cells[i][axis].extend(values);
        }

        let mut result: Vec<Vec<String>> = cells.iter().map(|cell| self.emit_cell(cell)).collect();
        result.sort();
        result
    }

    /// Emits one cell as specifier tokens: full axes are elided, macros are
    /// substituted greedily (largest expansion first), and the result is put
    /// in the host sort order.
    fn emit_cell(&self, cell: &[BTreeSet<String>; 3]) -> Vec<String> {
        let mut tokens = Vec::new();
        for axis in Axis::ALL {
            let values = &cell[axis.index()];
            if *values == self.axis_value_sets[axis.index()] {
                continue;
            }
            tokens.extend(self.substitute_macros(axis, values));
        }
        self.sorter.sort_specifiers(&mut tokens);
        tokens
    }

    fn substitute_macros(&self, axis: Axis, values: &BTreeSet<String>) -> Vec<String> {
        let mut remaining = values.clone();
        let mut tokens = Vec::new();

        let mut candidates: Vec<(&String, &Vec<String>)> = self
            .macros
            .iter()
            .filter(|(_, expansion)| {
                expansion.len() > 1
                    && expansion.iter().all(|v| self.value_to_axis.get(v) == Some(&axis))
            })
            .collect();
        candidates.sort_by(|a, b| b.1.len().cmp(&a.1.len()).then_with(|| a.0.cmp(b.0)));

        for (name, expansion) in candidates {
            if expansion.iter().all(|v| remaining.contains(v)) {
                for v in expansion {
                    remaining.remove(v);
                }
                tokens.push(name.clone());
            }
        }
        tokens.extend(remaining);
        tokens
    }
}

/// Finds two cells that agree on two axes and so can merge along the third.
fn find_merge(cells: &[[BTreeSet<String>; 3]]) -> Option<(usize, usize, usize)> {
    for i in 0..cells.len() {
        for j in (i + 1)..cells.len() {
            for axis in 0..3 {
                let others_equal =
                    (0..3).filter(|&a| a != axis).all(|a| cells[i][a] == cells[j][a]);
                if others_equal && cells[i][axis] != cells[j][axis] {
                    return Some((i, j, axis));
                }
            }
        }
    }
    None
}

fn single(value: String) -> BTreeSet<String> {
    let mut set = BTreeSet::new();
    set.insert(value);
    set
}

#[cfg(test)]
mod tests {
    use super::*;

    fn domain() -> ConfigurationDomain {
        ConfigurationDomain::default()
    }

    fn converter() -> ConfigurationConverter {
        ConfigurationConverter::new(&domain())
    }

    fn specs(tokens: &[&str]) -> Vec<String> {
        tokens.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn empty_specifiers_match_the_whole_domain() {
        let c = converter();
        let set = c.to_config_set(&[]);
        assert_eq!(set.len(), 7 * 2 * 2);
        assert_eq!(&set, c.all_configurations());
    }

    #[test]
    fn single_version_restricts_one_axis() {
        let c = converter();
        let set = c.to_config_set(&specs(&["xp"]));
        assert_eq!(set.len(), 4);
        assert!(set.iter().all(|config| config.version == "xp"));
    }

    #[test]
    fn same_axis_specifiers_union_and_axes_intersect() {
        let c = converter();
        let set = c.to_config_set(&specs(&["xp", "vista", "debug"]));
        assert_eq!(set.len(), 2 * 2);
        assert!(set.iter().all(|config| config.build_type == "debug"));
    }

    #[test]
    fn macros_expand_to_axis_values() {
        let c = converter();
        let via_macro = c.to_config_set(&specs(&["win", "release"]));
        let spelled_out = c.to_config_set(&specs(&["xp", "vista", "win7", "release"]));
        assert_eq!(via_macro, spelled_out);
    }

    #[test]
    fn unknown_specifier_matches_nothing_silently() {
        let c = converter();
        assert!(c.to_config_set(&specs(&["android", "release"])).is_empty());
    }

    #[test]
    fn specifiers_are_case_insensitive_at_conversion() {
        let c = converter();
        assert_eq!(
            c.to_config_set(&specs(&["XP", "Release"])),
            c.to_config_set(&specs(&["xp", "release"]))
        );
    }

    #[test]
    fn full_domain_serializes_to_the_empty_combination() {
        let c = converter();
        assert_eq!(c.to_specifiers_list(c.all_configurations()), vec![Vec::<String>::new()]);
    }

    #[test]
    fn empty_set_serializes_to_no_combinations() {
        let c = converter();
        assert!(c.to_specifiers_list(&BTreeSet::new()).is_empty());
    }

    #[test]
    fn rectangular_set_collapses_to_one_combination() {
        let c = converter();
        let input = c.to_config_set(&specs(&["win", "debug"]));
        let combos = c.to_specifiers_list(&input);
        assert_eq!(combos, vec![specs(&["win", "debug"])]);
    }

    #[test]
    fn sorter_orders_by_axis_then_declaration() {
        let c = converter();
        let mut tokens = specs(&["release", "x86", "vista"]);
        c.sorter().sort_specifiers(&mut tokens);
        assert_eq!(tokens, specs(&["vista", "x86", "release"]));
    }

    fn assert_exact_round_trip(c: &ConfigurationConverter, input: &BTreeSet<TestConfiguration>) {
        let combos = c.to_specifiers_list(input);
        let mut reexpanded = BTreeSet::new();
        for combo in &combos {
            reexpanded.extend(c.to_config_set(combo));
        }
        assert_eq!(&reexpanded, input, "combinations {combos:?} did not reproduce the input");
    }

    #[test]
    fn round_trip_is_exact_for_rectangular_sets() {
        let c = converter();
        for tokens in [
            specs(&["xp"]),
            specs(&["mac"]),
            specs(&["win", "x86", "debug"]),
            specs(&["linux", "release"]),
            specs(&["snowleopard", "lion"]),
        ] {
            assert_exact_round_trip(&c, &c.to_config_set(&tokens));
        }
    }

    #[test]
    fn round_trip_is_exact_for_non_rectangular_sets() {
        let c = converter();

        // A union of two rectangles that do not merge into one.
        let mut input = c.to_config_set(&specs(&["xp", "debug"]));
        input.extend(c.to_config_set(&specs(&["lion", "release"])));
        assert_exact_round_trip(&c, &input);

        // An L-shape: all of vista plus the debug half of win7.
        let mut input = c.to_config_set(&specs(&["vista"]));
        input.extend(c.to_config_set(&specs(&["win7", "debug"])));
        assert_exact_round_trip(&c, &input);

        // A single configuration.
        let mut lone = BTreeSet::new();
        lone.insert(TestConfiguration::new("xp", "x86_64", "release"));
        assert_exact_round_trip(&c, &lone);

        // Everything except one configuration.
        let mut holed = c.all_configurations().clone();
        holed.remove(&TestConfiguration::new("lucid", "x86", "debug"));
        assert_exact_round_trip(&c, &holed);
    }

    #[test]
    fn round_trip_uses_macros_when_an_axis_covers_one() {
        let c = converter();
        let input = c.to_config_set(&specs(&["xp", "vista", "win7", "debug"]));
        let combos = c.to_specifiers_list(&input);
        assert_eq!(combos, vec![specs(&["win", "debug"])]);
    }

    #[test]
    fn configuration_parses_from_dashed_triple() {
        let config: TestConfiguration = "xp-x86-release".parse().unwrap();
        assert_eq!(config, TestConfiguration::new("xp", "x86", "release"));
        assert!("xp-release".parse::<TestConfiguration>().is_err());
    }
}
