use anyhow::{Context, Result};
use csv::{ByteRecord, ReaderBuilder};
use serde::Deserialize;
use std::{collections::HashMap, fs::File, io::Read, path::Path};
use tracing::{debug, warn};

use crate::geo::{zero_pad, GeoKey, STATE_FIPS_WIDTH};

/// `AGEGRP` value covering every age group.
pub const ALL_AGES_GROUP: u32 = 0;
/// `YEAR` value selecting the 7/1/2020 estimate of the `cc-est2021-all` vintage.
pub const ESTIMATE_YEAR_CODE: u32 = 2;

/// White and black population of one area.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RacePopulation {
    pub white: u64,
    pub black: u64,
}

impl std::ops::AddAssign for RacePopulation {
    fn add_assign(&mut self, rhs: Self) {
        self.white += rhs.white;
        self.black += rhs.black;
    }
}

#[derive(Debug, Deserialize)]
struct CountyRecord {
    #[serde(rename = "STATE")]
    state: String,
    #[serde(rename = "COUNTY")]
    county: String,
    #[serde(rename = "YEAR")]
    year: u32,
    #[serde(rename = "AGEGRP")]
    age_group: u32,
    #[serde(rename = "WA_MALE")]
    white_male: u64,
    #[serde(rename = "WA_FEMALE")]
    white_female: u64,
    #[serde(rename = "BA_MALE")]
    black_male: u64,
    #[serde(rename = "BA_FEMALE")]
    black_female: u64,
}

#[derive(Debug, Clone)]
pub struct CountyPopulation {
    pub name: Option<String>,
    pub population: RacePopulation,
}

/// County population by race, filtered to all ages and the fixed estimate year.
#[derive(Debug, Default)]
pub struct CountyPopulationTable {
    counties: HashMap<GeoKey, CountyPopulation>,
}

/// The census files are ISO-8859-1; every byte maps to the code point of the same value.
fn latin1_to_string(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

impl CountyPopulationTable {
    pub fn from_entries(entries: impl IntoIterator<Item = (GeoKey, RacePopulation)>) -> Self {
        let counties = entries
            .into_iter()
            .map(|(key, population)| {
                (
                    key,
                    CountyPopulation {
                        name: None,
                        population,
                    },
                )
            })
            .collect();
        Self { counties }
    }

    /// Parse the comma-delimited county estimates, keeping only
    /// [`ALL_AGES_GROUP`] rows of [`ESTIMATE_YEAR_CODE`].
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let headers = rdr.byte_headers().context("reading county header")?.clone();
        let name_idx = headers.iter().position(|h| h == b"CTYNAME");

        let mut counties = HashMap::new();
        let mut record = ByteRecord::new();
        let mut scanned = 0u64;
        while rdr
            .read_byte_record(&mut record)
            .with_context(|| format!("county record {}", scanned))?
        {
            scanned += 1;
            let row: CountyRecord = record
                .deserialize(Some(&headers))
                .with_context(|| format!("decoding county record {}", scanned))?;
            if row.age_group != ALL_AGES_GROUP || row.year != ESTIMATE_YEAR_CODE {
                continue;
            }

            let key = GeoKey::from_parts(&row.state, &row.county);
            if counties.contains_key(&key) {
                warn!(%key, "duplicate county estimate, keeping first");
                continue;
            }
            let name = name_idx
                .and_then(|i| record.get(i))
                .map(latin1_to_string);
            counties.insert(
                key,
                CountyPopulation {
                    name,
                    population: RacePopulation {
                        white: row.white_male + row.white_female,
                        black: row.black_male + row.black_female,
                    },
                },
            );
        }
        debug!(scanned, kept = counties.len(), "parsed county population table");
        Ok(Self { counties })
    }

    #[tracing::instrument(level = "info", skip(path), fields(path = %path.display()))]
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open county population table: {:?}", path))?;
        Self::from_reader(file).with_context(|| format!("parsing {:?}", path))
    }

    /// Population of one county; `None` when the county is not in the estimates.
    pub fn county(&self, key: &GeoKey) -> Option<RacePopulation> {
        self.counties.get(key).map(|c| c.population)
    }

    pub fn county_name(&self, key: &GeoKey) -> Option<&str> {
        self.counties.get(key).and_then(|c| c.name.as_deref())
    }

    /// Sum over every county of a state; `None` when the state has no counties.
    pub fn state_total(&self, state_fips: &str) -> Option<RacePopulation> {
        let state_fips = zero_pad(state_fips.trim(), STATE_FIPS_WIDTH);
        self.counties
            .iter()
            .filter(|(key, _)| key.state() == state_fips)
            .map(|(_, c)| c.population)
            .fold(None, |acc: Option<RacePopulation>, pop| {
                let mut total = acc.unwrap_or_default();
                total += pop;
                Some(total)
            })
    }

    pub fn len(&self) -> usize {
        self.counties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counties.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const HEADER: &str =
        "SUMLEV,STATE,COUNTY,STNAME,CTYNAME,YEAR,AGEGRP,TOT_POP,WA_MALE,WA_FEMALE,BA_MALE,BA_FEMALE\n";

    fn sample() -> Vec<u8> {
        let mut data = HEADER.as_bytes().to_vec();
        let rows = [
            "050,01,001,Alabama,Autauga County,1,0,58000,20000,21000,5000,5500",
            "050,01,001,Alabama,Autauga County,2,0,58805,21000,22000,5200,5700",
            "050,01,001,Alabama,Autauga County,2,1,3500,1000,1100,300,310",
            "050,01,003,Alabama,Baldwin County,2,0,231767,90000,95000,9000,9500",
            "050,06,037,California,Los Angeles County,2,0,10014009,3600000,3650000,420000,440000",
        ];
        for row in rows {
            data.extend_from_slice(row.as_bytes());
            data.push(b'\n');
        }
        // "Doña Ana County" in ISO-8859-1
        data.extend_from_slice(b"050,35,013,New Mexico,Do\xf1a Ana County,2,0,219561,90000,91000,2000,1900\n");
        data
    }

    #[test]
    fn keeps_only_all_ages_of_the_estimate_year() {
        let table = CountyPopulationTable::from_reader(Cursor::new(sample())).unwrap();
        assert_eq!(table.len(), 4);
        assert_eq!(
            table.county(&GeoKey::from_parts("01", "001")),
            Some(RacePopulation {
                white: 43000,
                black: 10900
            })
        );
    }

    #[test]
    fn missing_county_is_none() {
        let table = CountyPopulationTable::from_reader(Cursor::new(sample())).unwrap();
        assert_eq!(table.county(&GeoKey::from_parts("01", "999")), None);
    }

    #[test]
    fn decodes_latin1_names() {
        let table = CountyPopulationTable::from_reader(Cursor::new(sample())).unwrap();
        assert_eq!(
            table.county_name(&GeoKey::from_parts("35", "13")),
            Some("Doña Ana County")
        );
    }

    #[test]
    fn state_total_sums_counties() {
        let table = CountyPopulationTable::from_reader(Cursor::new(sample())).unwrap();
        assert_eq!(
            table.state_total("1"),
            Some(RacePopulation {
                white: 43000 + 185000,
                black: 10900 + 18500
            })
        );
        assert_eq!(table.state_total("99"), None);
    }
}
