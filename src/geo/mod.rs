// src/geo/mod.rs

use std::fmt;

use thiserror::Error;

use crate::reference::StateCodeTable;

/// Width of a state FIPS code.
pub const STATE_FIPS_WIDTH: usize = 2;
/// Width of a county FIPS code.
pub const COUNTY_FIPS_WIDTH: usize = 3;

/// State FIPS code of the District of Columbia.
pub const DC_STATE_FIPS: u32 = 11;
/// The incident file encodes D.C. counties inconsistently; every D.C. incident maps here.
pub const DC_COUNTY_FIPS: &str = "001";

/// Abbreviations used by the incident file that differ from the census `STUSAB`.
const STATE_ALIASES: &[(&str, &str)] = &[("NB", "NE")];

/// Composite (state FIPS, county FIPS) join key shared by all datasets.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GeoKey {
    state: String,
    county: String,
}

impl GeoKey {
    /// Build a key from raw numeric parts, zero-padding each to its width.
    pub fn from_parts(state: &str, county: &str) -> Self {
        Self {
            state: zero_pad(state.trim(), STATE_FIPS_WIDTH),
            county: zero_pad(county.trim(), COUNTY_FIPS_WIDTH),
        }
    }

    pub fn state(&self) -> &str {
        &self.state
    }

    pub fn county(&self) -> &str {
        &self.county
    }
}

impl fmt::Display for GeoKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.state, self.county)
    }
}

/// Left-pad `raw` with `'0'` up to `width`. Wider input is returned unchanged, never truncated.
/// A leading sign stays in front of the padding, so `"-6"` becomes `"-06"`.
pub fn zero_pad(raw: &str, width: usize) -> String {
    match raw.strip_prefix(['-', '+']) {
        Some(digits) => {
            let sign = &raw[..1];
            format!("{}{:0>width$}", sign, digits, width = width.saturating_sub(1))
        }
        None => format!("{:0>width$}", raw, width = width),
    }
}

/// Reasons a row's geography cannot be turned into a [`GeoKey`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("unknown state abbreviation {0:?}")]
    UnknownState(String),
}

/// Apply the fixed abbreviation aliases of the incident file.
pub fn normalize_state_abbr(raw: &str) -> String {
    let abbr = raw.trim().to_ascii_uppercase();
    STATE_ALIASES
        .iter()
        .find(|(from, _)| *from == abbr)
        .map(|(_, to)| (*to).to_string())
        .unwrap_or(abbr)
}

/// Maps incident-file geography onto census FIPS keys.
pub struct GeoKeyResolver<'a> {
    states: &'a StateCodeTable,
}

impl<'a> GeoKeyResolver<'a> {
    pub fn new(states: &'a StateCodeTable) -> Self {
        Self { states }
    }

    /// Resolve a state abbreviation and raw county code into a canonical key.
    pub fn resolve(&self, state_abbr: &str, raw_county: &str) -> Result<GeoKey, ResolveError> {
        let abbr = normalize_state_abbr(state_abbr);
        let state_fips = self
            .states
            .fips(&abbr)
            .ok_or_else(|| ResolveError::UnknownState(abbr.clone()))?;
        let state = zero_pad(&state_fips.to_string(), STATE_FIPS_WIDTH);

        if state_fips == DC_STATE_FIPS {
            return Ok(GeoKey {
                state,
                county: DC_COUNTY_FIPS.to_string(),
            });
        }

        // blank and sentinel codes ("", "-6") still get a key; they simply
        // miss the population table later
        Ok(GeoKey {
            state,
            county: zero_pad(raw_county.trim(), COUNTY_FIPS_WIDTH),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn states() -> StateCodeTable {
        StateCodeTable::from_entries([
            ("CA", 6, "California"),
            ("NE", 31, "Nebraska"),
            ("DC", 11, "District of Columbia"),
            ("AL", 1, "Alabama"),
        ])
    }

    #[test]
    fn pads_short_county_codes() {
        let states = states();
        let resolver = GeoKeyResolver::new(&states);
        for raw in ["1", "01", "001", "37", "137"] {
            let key = resolver.resolve("CA", raw).unwrap();
            assert_eq!(key.county().len(), 3, "raw {raw}");
            assert!(key.county().ends_with(raw.trim_start_matches('0')));
            assert!(key.county().chars().all(|c| c.is_ascii_digit()));
        }
        assert_eq!(resolver.resolve("CA", "7").unwrap().county(), "007");
    }

    #[test]
    fn pads_state_fips() {
        let states = states();
        let resolver = GeoKeyResolver::new(&states);
        let key = resolver.resolve("AL", "1").unwrap();
        assert_eq!(key, GeoKey::from_parts("01", "001"));
        assert_eq!(key.to_string(), "01001");
    }

    #[test]
    fn wide_county_codes_pass_through_untruncated() {
        let states = states();
        let resolver = GeoKeyResolver::new(&states);
        let key = resolver.resolve("CA", "12345").unwrap();
        assert_eq!(key.county(), "12345");
        assert_eq!(zero_pad("12345", 3), "12345");
    }

    #[test]
    fn nb_is_an_alias_for_nebraska() {
        let states = states();
        let resolver = GeoKeyResolver::new(&states);
        assert_eq!(
            resolver.resolve("NB", "55").unwrap(),
            resolver.resolve("NE", "55").unwrap()
        );
        assert_eq!(resolver.resolve("NB", "55").unwrap().state(), "31");
    }

    #[test]
    fn dc_county_is_forced() {
        let states = states();
        let resolver = GeoKeyResolver::new(&states);
        let a = resolver.resolve("DC", "999").unwrap();
        let b = resolver.resolve("DC", "1").unwrap();
        let c = resolver.resolve("DC", "").unwrap();
        assert_eq!(a, GeoKey::from_parts("11", "001"));
        assert_eq!(a, b);
        assert_eq!(b, c);
    }

    #[test]
    fn unknown_state_is_an_error() {
        let states = states();
        let resolver = GeoKeyResolver::new(&states);
        assert_eq!(
            resolver.resolve("ZZ", "001"),
            Err(ResolveError::UnknownState("ZZ".into()))
        );
    }

    #[test]
    fn blank_and_sentinel_counties_are_padded() {
        let states = states();
        let resolver = GeoKeyResolver::new(&states);
        assert_eq!(resolver.resolve("CA", "").unwrap(), GeoKey::from_parts("06", "000"));
        assert_eq!(resolver.resolve("CA", "  ").unwrap().county(), "000");
        assert_eq!(resolver.resolve("CA", "-6").unwrap().county(), "-06");
        assert_eq!(zero_pad("-1234", 3), "-1234");
    }
}
