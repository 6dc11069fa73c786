use crate::analyze::{Completeness, Variant};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;

pub const PROJECT_COLUMN: &str = "project";

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Count(u64),
    Date(Option<DateTime<Utc>>),
    Text(Option<String>),
    Number(Option<f64>),
    Flag(Option<bool>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Count,
    Date,
    Text,
    Number,
    Flag,
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Count(_) => ValueKind::Count,
            Value::Date(_) => ValueKind::Date,
            Value::Text(_) => ValueKind::Text,
            Value::Number(_) => ValueKind::Number,
            Value::Flag(_) => ValueKind::Flag,
        }
    }
}

impl ValueKind {
    /// What a row that never produced the column contributes.
    pub fn absent(self) -> Value {
        match self {
            ValueKind::Count => Value::Count(0),
            ValueKind::Date => Value::Date(None),
            ValueKind::Text => Value::Text(None),
            ValueKind::Number => Value::Number(None),
            ValueKind::Flag => Value::Flag(None),
        }
    }
}

/// One result row: named cells in insertion order, led by the project name.
/// Reports with several rows per project tell them apart by `key`.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateRow {
    project: String,
    key: Option<String>,
    cells: IndexMap<String, Value>,
}

impl AggregateRow {
    pub fn new(project: impl ToString) -> Self {
        let project = project.to_string();
        let mut cells = IndexMap::new();
        cells.insert(
            PROJECT_COLUMN.to_string(),
            Value::Text(Some(project.clone())),
        );
        Self {
            project,
            key: None,
            cells,
        }
    }

    pub fn with_key(mut self, key: impl ToString) -> Self {
        self.key = Some(key.to_string());
        self
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn set_count(&mut self, name: impl Into<String>, count: u64) {
        self.cells.insert(name.into(), Value::Count(count));
    }

    pub fn set_date(&mut self, name: impl Into<String>, date: Option<DateTime<Utc>>) {
        self.cells.insert(name.into(), Value::Date(date));
    }

    pub fn set_text(&mut self, name: impl Into<String>, text: impl ToString) {
        self.cells
            .insert(name.into(), Value::Text(Some(text.to_string())));
    }

    pub fn set_text_null(&mut self, name: impl Into<String>) {
        self.cells.insert(name.into(), Value::Text(None));
    }

    pub fn set_number(&mut self, name: impl Into<String>, number: f64) {
        self.cells.insert(name.into(), Value::Number(Some(number)));
    }

    pub fn set_flag(&mut self, name: impl Into<String>, flag: bool) {
        self.cells.insert(name.into(), Value::Flag(Some(flag)));
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.cells.get(name)
    }

    pub fn count(&self, name: &str) -> Option<u64> {
        match self.cells.get(name) {
            Some(Value::Count(count)) => Some(*count),
            _ => None,
        }
    }

    pub fn flag(&self, name: &str) -> Option<bool> {
        match self.cells.get(name) {
            Some(Value::Flag(flag)) => *flag,
            _ => None,
        }
    }

    pub fn cells(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.cells.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// `{in PR, not in PR} × {bug-inducing, not bug-inducing}` over commits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrossTab {
    pub in_inducing: u64,
    pub in_clean: u64,
    pub out_inducing: u64,
    pub out_clean: u64,
}

impl CrossTab {
    pub fn record(&mut self, in_pull_request: bool, bug_inducing: bool) {
        match (in_pull_request, bug_inducing) {
            (true, true) => self.in_inducing += 1,
            (true, false) => self.in_clean += 1,
            (false, true) => self.out_inducing += 1,
            (false, false) => self.out_clean += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.in_inducing + self.in_clean + self.out_inducing + self.out_clean
    }

    pub fn inducing(&self) -> u64 {
        self.in_inducing + self.out_inducing
    }

    /// Writes `#cmt±pr±bi{suffix}`.
    pub fn write(&self, row: &mut AggregateRow, suffix: &str) {
        let cells = [
            ("#cmt+pr+bi", self.in_inducing),
            ("#cmt+pr-bi", self.in_clean),
            ("#cmt-pr+bi", self.out_inducing),
            ("#cmt-pr-bi", self.out_clean),
        ];
        for (name, count) in cells {
            row.set_count(format!("{name}{suffix}"), count);
        }
    }
}

const HISTOGRAM_BUCKETS: [&str; 7] = [
    "nc==0",
    "nc==1",
    "2<=nc<=5",
    "6<=nc<=10",
    "11<=nc<=20",
    "21<=nc<=30",
    "30<nc",
];

/// Commits per analyzable merged pull request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitHistogram {
    buckets: [u64; 7],
}

impl CommitHistogram {
    fn bucket(commits: usize) -> usize {
        match commits {
            0 => 0,
            1 => 1,
            2..=5 => 2,
            6..=10 => 3,
            11..=20 => 4,
            21..=30 => 5,
            _ => 6,
        }
    }

    pub fn record(&mut self, commits: usize) {
        self.buckets[Self::bucket(commits)] += 1;
    }

    pub fn total(&self) -> u64 {
        self.buckets.iter().sum()
    }

    pub fn write(&self, row: &mut AggregateRow, prefix: &str) {
        for (name, count) in HISTOGRAM_BUCKETS.iter().zip(self.buckets) {
            row.set_count(format!("{prefix}{name}"), count);
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkageCounts {
    pub all: u64,
    pub partial: u64,
    pub none: u64,
    /// Incomplete in the join table but fully resolved through the SHA lookup.
    pub recovered: u64,
}

impl LinkageCounts {
    pub fn record(&mut self, completeness: Completeness) {
        match completeness {
            Completeness::All => self.all += 1,
            Completeness::Partial => self.partial += 1,
            Completeness::None => self.none += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.all + self.partial + self.none
    }

    pub fn write(&self, row: &mut AggregateRow, prefix: &str) {
        row.set_count(format!("{prefix}all"), self.all);
        row.set_count(format!("{prefix}partial"), self.partial);
        row.set_count(format!("{prefix}none"), self.none);
        row.set_count(format!("{prefix}recovered"), self.recovered);
    }
}

/// Units flagged under any variant, plus per-variant counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantTally<V: Variant> {
    any: u64,
    counts: IndexMap<V, u64>,
}

impl<V: Variant> Default for VariantTally<V> {
    fn default() -> Self {
        Self {
            any: 0,
            counts: V::ALL.iter().map(|variant| (*variant, 0)).collect(),
        }
    }
}

impl<V: Variant> VariantTally<V> {
    /// Counts one unit. A unit flagged by several variants counts once in `any`.
    pub fn record(&mut self, hits: impl IntoIterator<Item = V>) {
        let mut flagged = false;
        for variant in hits {
            if let Some(count) = self.counts.get_mut(&variant) {
                *count += 1;
                flagged = true;
            }
        }
        if flagged {
            self.any += 1;
        }
    }

    pub fn any(&self) -> u64 {
        self.any
    }

    pub fn get(&self, variant: V) -> u64 {
        self.counts.get(&variant).copied().unwrap_or(0)
    }

    /// Writes `{prefix}` for the union and `{prefix}_{suffix}` for every
    /// variant, so the column set never depends on the data.
    pub fn write(&self, row: &mut AggregateRow, prefix: &str) {
        row.set_count(prefix, self.any);
        for (variant, count) in &self.counts {
            row.set_count(format!("{prefix}_{}", variant.suffix()), *count);
        }
    }
}
