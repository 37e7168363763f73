// src/config.rs

use anyhow::{Context, Result};
use std::{env, path::PathBuf};
use url::Url;

use crate::reference::{ReferencePaths, ReferenceTable};

/// see https://www.census.gov/library/reference/code-lists/ansi/ansi-codes-for-states.html
pub const STATE_CODES_URL: &str = "https://www2.census.gov/geo/docs/reference/state.txt";
pub const COUNTY_RACE_POP_URL: &str = "https://www2.census.gov/programs-surveys/popest/datasets/2020-2021/counties/asrh/cc-est2021-all.csv";

pub const DEFAULT_DATA_DIR: &str = "_data";

pub const DATA_DIR_ENV: &str = "NIBRS_DATA_DIR";
pub const STATE_CODES_URL_ENV: &str = "NIBRS_STATE_CODES_URL";
pub const COUNTY_RACE_POP_URL_ENV: &str = "NIBRS_COUNTY_POP_URL";

/// Where reference data comes from and where it is cached.
#[derive(Clone, Debug)]
pub struct Config {
    pub data_dir: PathBuf,
    pub state_codes_url: Url,
    pub county_race_pop_url: Url,
}

impl Config {
    pub fn new(data_dir: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self {
            data_dir: data_dir.into(),
            state_codes_url: Url::parse(STATE_CODES_URL).context("parsing state codes URL")?,
            county_race_pop_url: Url::parse(COUNTY_RACE_POP_URL)
                .context("parsing county population URL")?,
        })
    }

    /// Defaults, overridden by `NIBRS_DATA_DIR`, `NIBRS_STATE_CODES_URL` and `NIBRS_COUNTY_POP_URL`.
    pub fn from_env() -> Result<Self> {
        let data_dir = env::var_os(DATA_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));
        let mut config = Self::new(data_dir)?;
        if let Ok(raw) = env::var(STATE_CODES_URL_ENV) {
            config.state_codes_url =
                Url::parse(&raw).with_context(|| format!("parsing {}={}", STATE_CODES_URL_ENV, raw))?;
        }
        if let Ok(raw) = env::var(COUNTY_RACE_POP_URL_ENV) {
            config.county_race_pop_url = Url::parse(&raw)
                .with_context(|| format!("parsing {}={}", COUNTY_RACE_POP_URL_ENV, raw))?;
        }
        Ok(config)
    }

    pub fn url(&self, table: ReferenceTable) -> &Url {
        match table {
            ReferenceTable::StateCodes => &self.state_codes_url,
            ReferenceTable::CountyRacePop => &self.county_race_pop_url,
        }
    }

    /// Local cache layout under the data directory.
    pub fn reference_paths(&self) -> ReferencePaths {
        let census = self.data_dir.join("census");
        ReferencePaths {
            state_codes: census.join("ansi").join("state.txt"),
            county_race_pop: census.join("2021").join("cc-est2021-all.csv"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_layout_lives_under_data_dir() {
        let config = Config::new("/tmp/nibrs").unwrap();
        let paths = config.reference_paths();
        assert_eq!(
            paths.state_codes,
            PathBuf::from("/tmp/nibrs/census/ansi/state.txt")
        );
        assert_eq!(
            paths.county_race_pop,
            PathBuf::from("/tmp/nibrs/census/2021/cc-est2021-all.csv")
        );
    }

    #[test]
    fn urls_by_table() {
        let config = Config::new(DEFAULT_DATA_DIR).unwrap();
        assert_eq!(config.url(ReferenceTable::StateCodes).as_str(), STATE_CODES_URL);
        assert!(config
            .url(ReferenceTable::CountyRacePop)
            .path()
            .ends_with("cc-est2021-all.csv"));
    }
}
