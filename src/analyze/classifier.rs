//! Per-commit verdicts: bug-fixing per heuristic and bug-inducing per SZZ variant.

use crate::model::FileAction;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::str::FromStr;

/// A closed set of named flags that each get their own output column.
pub trait Variant: Copy + Eq + Hash + Send + Sync + 'static {
    const ALL: &'static [Self];

    /// Lower-case column suffix.
    fn suffix(self) -> &'static str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BugFixVariant {
    AdjustedSzz,
    IssueOnly,
    Validated,
    IssueFasttext,
}

impl BugFixVariant {
    /// Key in the commit label map.
    ///
    /// `IssueFasttext` reads `issueonly_bugfix`, the same key as `IssueOnly`.
    /// Downstream tables carry both columns, so the two stay separate counters.
    pub fn label_key(self) -> &'static str {
        match self {
            Self::AdjustedSzz => "adjustedszz_bugfix",
            Self::IssueOnly => "issueonly_bugfix",
            Self::Validated => "validated_bugfix",
            Self::IssueFasttext => "issueonly_bugfix",
        }
    }
}

impl Variant for BugFixVariant {
    const ALL: &'static [Self] = &[
        Self::AdjustedSzz,
        Self::IssueOnly,
        Self::Validated,
        Self::IssueFasttext,
    ];

    fn suffix(self) -> &'static str {
        match self {
            Self::AdjustedSzz => "a",
            Self::IssueOnly => "io",
            Self::Validated => "v",
            Self::IssueFasttext => "if",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SzzVariant {
    Szz,
    JlR,
    JlipR,
    Jlmiv,
    JlmivPlus,
    JlmivR,
    JlmivAv,
    JlmivRav,
    Jlmivlv,
}

impl SzzVariant {
    /// Label as stored on induce records.
    pub fn label(self) -> &'static str {
        match self {
            Self::Szz => "SZZ",
            Self::JlR => "JL+R",
            Self::JlipR => "JLIP+R",
            Self::Jlmiv => "JLMIV",
            Self::JlmivPlus => "JLMIV+",
            Self::JlmivR => "JLMIV+R",
            Self::JlmivAv => "JLMIV+AV",
            Self::JlmivRav => "JLMIV+RAV",
            Self::Jlmivlv => "JLMIVLV",
        }
    }

    /// Exact, case-sensitive match against the stored label.
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|variant| variant.label() == label)
    }

    fn bit(self) -> u16 {
        1 << (self as u16)
    }
}

impl Variant for SzzVariant {
    const ALL: &'static [Self] = &[
        Self::Szz,
        Self::JlR,
        Self::JlipR,
        Self::Jlmiv,
        Self::JlmivPlus,
        Self::JlmivR,
        Self::JlmivAv,
        Self::JlmivRav,
        Self::Jlmivlv,
    ];

    fn suffix(self) -> &'static str {
        match self {
            Self::Szz => "szz",
            Self::JlR => "jl+r",
            Self::JlipR => "jlip+r",
            Self::Jlmiv => "jlmiv",
            Self::JlmivPlus => "jlmiv+",
            Self::JlmivR => "jlmiv+r",
            Self::JlmivAv => "jlmiv+av",
            Self::JlmivRav => "jlmiv+rav",
            Self::Jlmivlv => "jlmivlv",
        }
    }
}

impl fmt::Display for SzzVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for SzzVariant {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::from_label(value.trim()).ok_or_else(|| {
            format!(
                "unknown SZZ variant `{value}`, expected one of: {}",
                Self::ALL.iter().map(|v| v.label()).collect::<Vec<_>>().join(", ")
            )
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BugFixFlags([bool; 4]);

impl BugFixFlags {
    pub fn contains(&self, variant: BugFixVariant) -> bool {
        self.0[variant as usize]
    }

    pub fn set(&mut self, variant: BugFixVariant) {
        self.0[variant as usize] = true;
    }

    pub fn any(&self) -> bool {
        self.0.iter().any(|flag| *flag)
    }

    pub fn merge(&mut self, other: &Self) {
        for (flag, other) in self.0.iter_mut().zip(other.0) {
            *flag |= other;
        }
    }
}

/// Set of SZZ variants, one bit each.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct VariantSet(u16);

impl VariantSet {
    pub fn insert(&mut self, variant: SzzVariant) {
        self.0 |= variant.bit();
    }

    pub fn contains(&self, variant: SzzVariant) -> bool {
        self.0 & variant.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn union(&mut self, other: &Self) {
        self.0 |= other.0;
    }

    pub fn iter(&self) -> impl Iterator<Item = SzzVariant> + '_ {
        SzzVariant::ALL
            .iter()
            .copied()
            .filter(move |variant| self.contains(*variant))
    }
}

impl FromIterator<SzzVariant> for VariantSet {
    fn from_iter<I: IntoIterator<Item = SzzVariant>>(iter: I) -> Self {
        let mut set = Self::default();
        for variant in iter {
            set.insert(variant);
        }
        set
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitVerdict {
    pub in_pull_request: bool,
    pub bug_fixing: BugFixFlags,
    pub bug_inducing: VariantSet,
}

impl CommitVerdict {
    pub fn with_pull_request(mut self, in_pull_request: bool) -> Self {
        self.in_pull_request = in_pull_request;
        self
    }

    pub fn is_bug_fixing(&self) -> bool {
        self.bug_fixing.any()
    }

    pub fn is_bug_inducing(&self) -> bool {
        !self.bug_inducing.is_empty()
    }

    /// OR-fold, used to derive a pull request verdict from its commits.
    pub fn merge(&mut self, other: &Self) {
        self.in_pull_request |= other.in_pull_request;
        self.bug_fixing.merge(&other.bug_fixing);
        self.bug_inducing.union(&other.bug_inducing);
    }
}

pub fn classify_labels(labels: &HashMap<String, bool>) -> BugFixFlags {
    let mut flags = BugFixFlags::default();
    for variant in BugFixVariant::ALL {
        if labels.get(variant.label_key()).copied().unwrap_or(false) {
            flags.set(*variant);
        }
    }
    flags
}

/// Union of the induce labels over all file actions of one commit.
pub fn inducing_variants(file_actions: &[FileAction]) -> VariantSet {
    let mut set = VariantSet::default();
    for induce in file_actions.iter().flat_map(|action| &action.induces) {
        match SzzVariant::from_label(&induce.label) {
            Some(variant) => set.insert(variant),
            None => tracing::debug!(label = %induce.label, "ignoring unknown induce label"),
        }
    }
    set
}

pub fn classify_commit(labels: &HashMap<String, bool>, file_actions: &[FileAction]) -> CommitVerdict {
    CommitVerdict {
        in_pull_request: false,
        bug_fixing: classify_labels(labels),
        bug_inducing: inducing_variants(file_actions),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pairs: &[(&str, bool)]) -> HashMap<String, bool> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn absent_labels_default_to_false() {
        let verdict = classify_commit(&HashMap::new(), &[]);
        assert!(!verdict.is_bug_fixing());
        assert!(!verdict.is_bug_inducing());
    }

    #[test]
    fn issue_only_feeds_both_duplicated_counters() {
        let flags = classify_labels(&labels(&[("issueonly_bugfix", true)]));
        assert!(flags.contains(BugFixVariant::IssueOnly));
        assert!(flags.contains(BugFixVariant::IssueFasttext));
        assert!(!flags.contains(BugFixVariant::AdjustedSzz));
        assert!(!flags.contains(BugFixVariant::Validated));
    }

    #[test]
    fn explicit_false_label_is_not_a_fix() {
        let flags = classify_labels(&labels(&[
            ("adjustedszz_bugfix", false),
            ("validated_bugfix", true),
        ]));
        assert!(!flags.contains(BugFixVariant::AdjustedSzz));
        assert!(flags.contains(BugFixVariant::Validated));
        assert!(flags.any());
    }

    #[test]
    fn inducing_labels_are_unioned_across_file_actions() {
        let actions = vec![
            FileAction::new("f1", "c1", None).with_induce("JL+R"),
            FileAction::new("f2", "c1", None)
                .with_induce("SZZ")
                .with_induce("JL+R"),
            FileAction::new("f3", "c1", None),
        ];
        let set = inducing_variants(&actions);
        assert_eq!(set.len(), 2);
        assert!(set.contains(SzzVariant::JlR));
        assert!(set.contains(SzzVariant::Szz));
        assert_eq!(
            set.iter().collect::<Vec<_>>(),
            vec![SzzVariant::Szz, SzzVariant::JlR]
        );
    }

    #[test]
    fn inducing_match_is_case_sensitive() {
        let actions = vec![FileAction::new("f1", "c1", None).with_induce("jl+r")];
        assert!(inducing_variants(&actions).is_empty());
    }

    #[test]
    fn empty_induce_lists_are_not_inducing() {
        let actions = vec![FileAction::new("f1", "c1", None)];
        assert!(!classify_commit(&HashMap::new(), &actions).is_bug_inducing());
    }

    #[test]
    fn merge_is_an_or_fold() {
        let mut verdict = classify_commit(&labels(&[("validated_bugfix", true)]), &[]);
        let other = classify_commit(
            &HashMap::new(),
            &[FileAction::new("f", "c2", None).with_induce("JLMIV+R")],
        );
        verdict.merge(&other);
        assert!(verdict.is_bug_fixing());
        assert!(verdict.bug_inducing.contains(SzzVariant::JlmivR));
    }

    #[test]
    fn variant_parsing_round_trips_labels() {
        for variant in SzzVariant::ALL {
            assert_eq!(variant.label().parse::<SzzVariant>(), Ok(*variant));
            assert_eq!(variant.suffix(), variant.label().to_lowercase());
        }
        assert!("szz".parse::<SzzVariant>().is_err());
    }
}
