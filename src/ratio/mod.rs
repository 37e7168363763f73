// src/ratio/mod.rs

use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::aggregate::{CountsRow, CountsTable};
use crate::geo::GeoKey;
use crate::reference::{CountyPopulationTable, RacePopulation, StateCodeTable};

pub mod fit;

pub use fit::LogLogFit;

/// Division where a missing operand or a zero denominator is "not available".
pub fn safe_divide(numerator: Option<f64>, denominator: Option<f64>) -> Option<f64> {
    match (numerator, denominator) {
        (Some(n), Some(d)) if d != 0.0 => Some(n / d),
        _ => None,
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Ratios {
    /// black-on-white incidents per white-on-black incident
    pub incidents: Option<f64>,
    /// white population per black resident
    pub population: Option<f64>,
}

impl Ratios {
    pub fn of(counts: &CountsRow, population: Option<RacePopulation>) -> Self {
        Self {
            incidents: safe_divide(
                Some(counts.black_on_white as f64),
                Some(counts.white_on_black as f64),
            ),
            population: safe_divide(
                population.map(|p| p.white as f64),
                population.map(|p| p.black as f64),
            ),
        }
    }

    /// Both ratios exist and are strictly positive, so both survive a log scale.
    pub fn is_plottable(&self) -> bool {
        matches!(
            (self.incidents, self.population),
            (Some(i), Some(p)) if i > 0.0 && p > 0.0
        )
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RatioRow {
    pub key: GeoKey,
    pub county_name: Option<String>,
    pub counts: CountsRow,
    pub population: Option<RacePopulation>,
    pub ratios: Ratios,
}

/// The synthetic `USA` row: every county's counters, and the population of
/// every county whose estimate was available.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NationalSummary {
    pub counts: CountsRow,
    pub population: RacePopulation,
    pub ratios: Ratios,
}

#[derive(Clone, Debug, PartialEq)]
pub struct StateSummary {
    pub state_fips: String,
    pub name: Option<String>,
    pub counts: CountsRow,
    pub population: Option<RacePopulation>,
    pub ratios: Ratios,
}

/// Counts joined with population, one row per county, plus the national row.
#[derive(Clone, Debug)]
pub struct JoinedTable {
    pub rows: Vec<RatioRow>,
    pub national: NationalSummary,
}

impl JoinedTable {
    /// `rows` is sorted by key, as produced by [`RatioDeriver::derive`].
    pub fn get(&self, key: &GeoKey) -> Option<&RatioRow> {
        self.rows
            .binary_search_by(|r| r.key.cmp(key))
            .ok()
            .map(|i| &self.rows[i])
    }

    /// Rows usable on log-log axes; the table itself is left untouched.
    pub fn plottable(&self) -> impl Iterator<Item = &RatioRow> {
        self.rows.iter().filter(|r| r.ratios.is_plottable())
    }

    /// Fit `log10(incidents) = slope * log10(population) + intercept` over the plottable rows.
    pub fn fit(&self) -> Option<LogLogFit> {
        LogLogFit::fit(self.plottable().filter_map(|r| {
            Some((r.ratios.population?, r.ratios.incidents?))
        }))
    }
}

/// Joins incident counts with county populations.
pub struct RatioDeriver<'a> {
    counties: &'a CountyPopulationTable,
}

impl<'a> RatioDeriver<'a> {
    pub fn new(counties: &'a CountyPopulationTable) -> Self {
        Self { counties }
    }

    pub fn derive(&self, counts: &CountsTable) -> JoinedTable {
        let national_counts = counts.total();

        let mut national_population = RacePopulation::default();
        let mut missing = 0usize;
        let rows: Vec<RatioRow> = counts
            .iter()
            .map(|(key, row)| {
                let population = self.counties.county(key);
                match population {
                    Some(p) => national_population += p,
                    None => missing += 1,
                }
                RatioRow {
                    key: key.clone(),
                    county_name: self.counties.county_name(key).map(str::to_string),
                    counts: *row,
                    population,
                    ratios: Ratios::of(row, population),
                }
            })
            .collect();

        if missing > 0 {
            debug!(missing, "counties without a population estimate");
        }

        let national = NationalSummary {
            counts: national_counts,
            population: national_population,
            ratios: Ratios::of(&national_counts, Some(national_population)),
        };
        info!(
            counties = rows.len(),
            white_on_black = national.counts.white_on_black,
            black_on_white = national.counts.black_on_white,
            incidents_ratio = ?national.ratios.incidents,
            "joined counts with population"
        );

        JoinedTable { rows, national }
    }

    /// Per-state totals, joined with the population of every county in the state.
    pub fn state_rollup(&self, counts: &CountsTable, states: &StateCodeTable) -> Vec<StateSummary> {
        let mut by_state: BTreeMap<String, CountsRow> = BTreeMap::new();
        for (key, row) in counts.iter() {
            *by_state
                .entry(key.state().to_string())
                .or_insert_with(CountsRow::zero) += *row;
        }

        by_state
            .into_iter()
            .map(|(state_fips, row)| {
                let population = self.counties.state_total(&state_fips);
                let name = state_fips
                    .parse::<u32>()
                    .ok()
                    .and_then(|fips| states.name_by_fips(fips))
                    .map(str::to_string);
                StateSummary {
                    name,
                    counts: row,
                    population,
                    ratios: Ratios::of(&row, population),
                    state_fips,
                }
            })
            .collect()
    }
}
