use crate::client::Category;
use std::collections::{BTreeMap, HashMap};

/// Resolved outcome for one entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryResult {
    /// Canonical identifier used to query the metrics API
    pub slug: String,
    /// Aggregate pageviews over the run's metric range
    pub views: u64,
}

/// Completed entries of one year, keyed by entry name
///
/// Presence in the map is the completion marker. Iteration order carries no
/// meaning.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct YearRecord {
    entries: HashMap<String, EntryResult>,
}

impl YearRecord {
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&EntryResult> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &EntryResult)> {
        self.entries.iter()
    }
}

/// One row of the downstream `(name, year, views)` view
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryRow {
    pub name: String,
    pub year: i32,
    pub slug: String,
    pub views: u64,
}

/// The persisted crawl aggregate
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlState {
    /// Snapshot of the top-level category, fetched once per run identifier
    pub root_category: Option<Category>,
    years: BTreeMap<i32, YearRecord>,
}

impl CrawlState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_complete(&self, year: i32, name: &str) -> bool {
        self.years
            .get(&year)
            .map(|record| record.contains(name))
            .unwrap_or(false)
    }

    /// Records a resolved entry
    ///
    /// Returns false and leaves the existing result untouched if the entry was
    /// already recorded for that year.
    pub fn record(&mut self, year: i32, name: &str, result: EntryResult) -> bool {
        let record = self.years.entry(year).or_default();
        if record.contains(name) {
            return false;
        }
        record.entries.insert(name.to_string(), result);
        true
    }

    pub fn year(&self, year: i32) -> Option<&YearRecord> {
        self.years.get(&year)
    }

    pub fn years(&self) -> impl Iterator<Item = (i32, &YearRecord)> {
        self.years.iter().map(|(year, record)| (*year, record))
    }

    /// Total number of recorded entries across all years
    pub fn entry_count(&self) -> usize {
        self.years.values().map(YearRecord::len).sum()
    }

    /// All recorded entries, ordered by year then name
    pub fn entries(&self) -> Vec<EntryRow> {
        let mut rows = Vec::with_capacity(self.entry_count());
        for (year, record) in &self.years {
            let mut names: Vec<&String> = record.entries.keys().collect();
            names.sort();
            for name in names {
                let result = &record.entries[name];
                rows.push(EntryRow {
                    name: name.clone(),
                    year: *year,
                    slug: result.slug.clone(),
                    views: result.views,
                });
            }
        }
        rows
    }

    /// Entry names recorded under more than one year, with their years
    pub fn duplicate_names(&self) -> BTreeMap<String, Vec<i32>> {
        let mut seen: BTreeMap<String, Vec<i32>> = BTreeMap::new();
        for (year, record) in &self.years {
            for name in record.entries.keys() {
                seen.entry(name.clone()).or_default().push(*year);
            }
        }
        seen.retain(|_, years| years.len() > 1);
        seen
    }
}
