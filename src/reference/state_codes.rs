use anyhow::{Context, Result};
use csv::ReaderBuilder;
use serde::Deserialize;
use std::{collections::HashMap, fs::File, io::Read, path::Path};
use tracing::{debug, warn};

/// One row of the census `state.txt` listing (`STATE|STUSAB|STATE_NAME|STATENS`).
#[derive(Debug, Deserialize)]
struct StateCodeRecord {
    #[serde(rename = "STATE")]
    fips: u32,
    #[serde(rename = "STUSAB")]
    abbr: String,
    #[serde(rename = "STATE_NAME", default)]
    name: String,
}

#[derive(Debug, Clone)]
struct StateEntry {
    fips: u32,
    name: String,
}

/// Two-letter abbreviation → numeric state FIPS code.
#[derive(Debug, Default)]
pub struct StateCodeTable {
    by_abbr: HashMap<String, StateEntry>,
    names_by_fips: HashMap<u32, String>,
}

impl StateCodeTable {
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = (&'a str, u32, &'a str)>) -> Self {
        let mut table = Self::default();
        for (abbr, fips, name) in entries {
            table.insert(abbr.to_string(), fips, name.to_string());
        }
        table
    }

    /// Parse the pipe-delimited listing.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = ReaderBuilder::new()
            .delimiter(b'|')
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut table = Self::default();
        for (idx, result) in rdr.deserialize::<StateCodeRecord>().enumerate() {
            let record = result.with_context(|| format!("state code record {}", idx))?;
            if table.by_abbr.contains_key(&record.abbr) {
                warn!(abbr = %record.abbr, "duplicate state abbreviation, keeping first");
                continue;
            }
            table.insert(record.abbr, record.fips, record.name);
        }
        debug!(states = table.len(), "parsed state code table");
        Ok(table)
    }

    #[tracing::instrument(level = "info", skip(path), fields(path = %path.display()))]
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open state code table: {:?}", path))?;
        Self::from_reader(file).with_context(|| format!("parsing {:?}", path))
    }

    fn insert(&mut self, abbr: String, fips: u32, name: String) {
        self.names_by_fips.insert(fips, name.clone());
        self.by_abbr.insert(abbr, StateEntry { fips, name });
    }

    pub fn fips(&self, abbr: &str) -> Option<u32> {
        self.by_abbr.get(abbr).map(|e| e.fips)
    }

    pub fn name(&self, abbr: &str) -> Option<&str> {
        self.by_abbr.get(abbr).map(|e| e.name.as_str())
    }

    pub fn name_by_fips(&self, fips: u32) -> Option<&str> {
        self.names_by_fips.get(&fips).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_abbr.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_abbr.is_empty()
    }
}
