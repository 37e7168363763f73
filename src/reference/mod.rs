// src/reference/mod.rs

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use std::path::{Path, PathBuf};
use tracing::info;

pub mod county_pop;
pub mod state_codes;

pub use county_pop::{CountyPopulationTable, RacePopulation, ALL_AGES_GROUP, ESTIMATE_YEAR_CODE};
pub use state_codes::StateCodeTable;

/// Logical names of the reference datasets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ReferenceTable {
    StateCodes,
    CountyRacePop,
}

impl ReferenceTable {
    pub const ALL: [ReferenceTable; 2] = [ReferenceTable::StateCodes, ReferenceTable::CountyRacePop];

    pub fn name(&self) -> &'static str {
        match self {
            ReferenceTable::StateCodes => "state_codes",
            ReferenceTable::CountyRacePop => "county_race_pop",
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        match s.trim() {
            "state_codes" => Some(ReferenceTable::StateCodes),
            "county_race_pop" => Some(ReferenceTable::CountyRacePop),
            _ => None,
        }
    }
}

/// Local files backing each reference table.
#[derive(Clone, Debug, Default)]
pub struct ReferencePaths {
    pub state_codes: PathBuf,
    pub county_race_pop: PathBuf,
}

impl ReferencePaths {
    pub fn path(&self, table: ReferenceTable) -> &Path {
        match table {
            ReferenceTable::StateCodes => &self.state_codes,
            ReferenceTable::CountyRacePop => &self.county_race_pop,
        }
    }
}

/// Lazily loaded, read-only reference tables.
///
/// Each table is parsed at most once per cache; concurrent first callers
/// block on the same load and every later call returns the same table.
pub struct ReferenceTableCache {
    paths: ReferencePaths,
    state_codes: OnceCell<StateCodeTable>,
    county_race_pop: OnceCell<CountyPopulationTable>,
}

impl ReferenceTableCache {
    pub fn new(paths: ReferencePaths) -> Self {
        Self {
            paths,
            state_codes: OnceCell::new(),
            county_race_pop: OnceCell::new(),
        }
    }

    /// A cache whose tables are already materialized.
    pub fn with_tables(state_codes: StateCodeTable, county_race_pop: CountyPopulationTable) -> Self {
        Self {
            paths: ReferencePaths::default(),
            state_codes: OnceCell::with_value(state_codes),
            county_race_pop: OnceCell::with_value(county_race_pop),
        }
    }

    pub fn state_codes(&self) -> Result<&StateCodeTable> {
        self.state_codes.get_or_try_init(|| {
            let path = self.paths.path(ReferenceTable::StateCodes);
            let table = StateCodeTable::load(path)
                .with_context(|| format!("loading {}", ReferenceTable::StateCodes.name()))?;
            info!(table = ReferenceTable::StateCodes.name(), rows = table.len(), "loaded");
            Ok(table)
        })
    }

    pub fn county_race_pop(&self) -> Result<&CountyPopulationTable> {
        self.county_race_pop.get_or_try_init(|| {
            let path = self.paths.path(ReferenceTable::CountyRacePop);
            let table = CountyPopulationTable::load(path)
                .with_context(|| format!("loading {}", ReferenceTable::CountyRacePop.name()))?;
            info!(table = ReferenceTable::CountyRacePop.name(), rows = table.len(), "loaded");
            Ok(table)
        })
    }

    pub fn is_loaded(&self, table: ReferenceTable) -> bool {
        match table {
            ReferenceTable::StateCodes => self.state_codes.get().is_some(),
            ReferenceTable::CountyRacePop => self.county_race_pop.get().is_some(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::GeoKey;
    use std::{fs, sync::Arc, thread};
    use tempfile::tempdir;

    fn write_fixtures(dir: &Path) -> ReferencePaths {
        let state_codes = dir.join("state.txt");
        fs::write(
            &state_codes,
            "STATE|STUSAB|STATE_NAME|STATENS\n06|CA|California|01779778\n",
        )
        .unwrap();
        let county_race_pop = dir.join("cc-est2021-all.csv");
        fs::write(
            &county_race_pop,
            "STATE,COUNTY,YEAR,AGEGRP,WA_MALE,WA_FEMALE,BA_MALE,BA_FEMALE\n06,001,2,0,10,11,3,4\n06,001,3,0,99,99,99,99\n",
        )
        .unwrap();
        ReferencePaths {
            state_codes,
            county_race_pop,
        }
    }

    #[test]
    fn table_names_round_trip() {
        for table in ReferenceTable::ALL {
            assert_eq!(ReferenceTable::from_name(table.name()), Some(table));
        }
        assert_eq!(ReferenceTable::from_name("votes"), None);
    }

    #[test]
    fn loads_lazily_and_once() {
        let tmp = tempdir().unwrap();
        let paths = write_fixtures(tmp.path());
        let cache = ReferenceTableCache::new(paths.clone());
        assert!(!cache.is_loaded(ReferenceTable::StateCodes));
        assert!(!cache.is_loaded(ReferenceTable::CountyRacePop));

        let first = cache.state_codes().unwrap() as *const StateCodeTable;
        assert!(cache.is_loaded(ReferenceTable::StateCodes));
        assert!(!cache.is_loaded(ReferenceTable::CountyRacePop));

        let counties = cache.county_race_pop().unwrap();
        assert_eq!(
            counties.county(&GeoKey::from_parts("06", "001")),
            Some(RacePopulation { white: 21, black: 7 })
        );

        // once loaded, the files are no longer consulted
        fs::remove_file(&paths.state_codes).unwrap();
        fs::remove_file(&paths.county_race_pop).unwrap();
        let second = cache.state_codes().unwrap() as *const StateCodeTable;
        assert_eq!(first, second);
        assert!(cache.county_race_pop().is_ok());
    }

    #[test]
    fn concurrent_callers_share_one_table() {
        let tmp = tempdir().unwrap();
        let cache = Arc::new(ReferenceTableCache::new(write_fixtures(tmp.path())));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || cache.county_race_pop().unwrap() as *const _ as usize)
            })
            .collect();
        let addrs: Vec<usize> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(addrs.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn missing_file_is_an_error_and_can_retry() {
        let tmp = tempdir().unwrap();
        let paths = ReferencePaths {
            state_codes: tmp.path().join("absent.txt"),
            county_race_pop: tmp.path().join("absent.csv"),
        };
        let cache = ReferenceTableCache::new(paths.clone());
        assert!(cache.state_codes().is_err());
        assert!(!cache.is_loaded(ReferenceTable::StateCodes));

        fs::write(&paths.state_codes, "STATE|STUSAB\n06|CA\n").unwrap();
        assert_eq!(cache.state_codes().unwrap().fips("CA"), Some(6));
    }

    #[test]
    fn preloaded_tables_skip_disk() {
        let cache = ReferenceTableCache::with_tables(
            StateCodeTable::from_entries([("CA", 6, "California")]),
            CountyPopulationTable::default(),
        );
        assert!(cache.is_loaded(ReferenceTable::StateCodes));
        assert_eq!(cache.state_codes().unwrap().fips("CA"), Some(6));
        assert!(cache.county_race_pop().unwrap().is_empty());
    }
}
