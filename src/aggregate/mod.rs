// src/aggregate/mod.rs

use anyhow::{bail, Context, Result};
use csv::{ReaderBuilder, StringRecord};
use std::{collections::BTreeMap, fs::File, io::Read, path::Path};
use tracing::{debug, info, warn};

use crate::geo::{GeoKey, GeoKeyResolver};
use crate::reference::StateCodeTable;

/// Offense codes counted as violent incidents:
/// 91 murder/nonnegligent manslaughter, 120 robbery, 131 aggravated assault,
/// 132 simple assault. 92 (negligent manslaughter) is deliberately absent.
pub const VIOLENT_OFFENSES: &[&str] = &["91", "120", "131", "132"];

pub const WHITE: &str = "1";
pub const BLACK: &str = "2";

/// Header names of the fields read from the incident file.
#[derive(Clone, Copy, Debug)]
pub struct IncidentSchema {
    pub offense: &'static str,
    pub victim_race: [&'static str; 3],
    pub offender_race: [&'static str; 3],
    pub state: &'static str,
    pub county: &'static str,
}

/// Field codes of the 2020 NIBRS incident-level extract.
pub const NIBRS_2020: IncidentSchema = IncidentSchema {
    offense: "V20061",
    victim_race: ["V40201", "V40202", "V40203"],
    offender_race: ["V50091", "V50092", "V50093"],
    state: "BH008",
    county: "BH054",
};

impl Default for IncidentSchema {
    fn default() -> Self {
        NIBRS_2020
    }
}

/// Positions of the schema's fields within one particular file.
#[derive(Debug)]
struct Columns {
    offense: usize,
    victim_race: [usize; 3],
    offender_race: [usize; 3],
    state: usize,
    county: usize,
}

impl IncidentSchema {
    fn locate(&self, headers: &StringRecord) -> Result<Columns> {
        let find = |name: &str| -> Result<usize> {
            match headers.iter().position(|h| h == name) {
                Some(i) => Ok(i),
                None => bail!("incident header is missing required field {:?}", name),
            }
        };
        Ok(Columns {
            offense: find(self.offense)?,
            victim_race: [
                find(self.victim_race[0])?,
                find(self.victim_race[1])?,
                find(self.victim_race[2])?,
            ],
            offender_race: [
                find(self.offender_race[0])?,
                find(self.offender_race[1])?,
                find(self.offender_race[2])?,
            ],
            state: find(self.state)?,
            county: find(self.county)?,
        })
    }
}

/// Which interracial directions a single incident matches. Both may hold.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Direction {
    pub white_on_black: bool,
    pub black_on_white: bool,
}

impl Direction {
    pub fn classify(victims: &[&str], offenders: &[&str]) -> Self {
        let has = |codes: &[&str], race: &str| codes.iter().any(|c| *c == race);
        Self {
            white_on_black: has(offenders, WHITE) && has(victims, BLACK),
            black_on_white: has(offenders, BLACK) && has(victims, WHITE),
        }
    }

    pub fn is_interracial(&self) -> bool {
        self.white_on_black || self.black_on_white
    }
}

pub fn is_violent_offense(code: &str) -> bool {
    VIOLENT_OFFENSES.contains(&code)
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CountsRow {
    pub white_on_black: u64,
    pub black_on_white: u64,
}

impl CountsRow {
    pub const fn zero() -> Self {
        Self {
            white_on_black: 0,
            black_on_white: 0,
        }
    }

    fn add(&mut self, direction: Direction) {
        self.white_on_black += u64::from(direction.white_on_black);
        self.black_on_white += u64::from(direction.black_on_white);
    }
}

impl std::ops::AddAssign for CountsRow {
    fn add_assign(&mut self, rhs: Self) {
        self.white_on_black += rhs.white_on_black;
        self.black_on_white += rhs.black_on_white;
    }
}

/// Per-county incident counts; a county appears once it has a counted incident.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CountsTable {
    rows: BTreeMap<GeoKey, CountsRow>,
}

impl CountsTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, key: GeoKey, direction: Direction) {
        let row = self.rows.entry(key).or_insert_with(CountsRow::zero);
        row.add(direction);
    }

    pub fn get(&self, key: &GeoKey) -> Option<&CountsRow> {
        self.rows.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&GeoKey, &CountsRow)> {
        self.rows.iter()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Sum of every county's counters.
    pub fn total(&self) -> CountsRow {
        self.rows.values().fold(CountsRow::zero(), |mut acc, row| {
            acc += *row;
            acc
        })
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AggregateStats {
    pub rows: u64,
    pub malformed: u64,
    pub non_violent: u64,
    pub not_interracial: u64,
    pub unresolved: u64,
    pub counted: u64,
}

#[derive(Debug)]
pub struct Aggregation {
    pub counts: CountsTable,
    pub stats: AggregateStats,
}

/// Streams an incident file into a [`CountsTable`].
pub struct IncidentAggregator<'a> {
    resolver: GeoKeyResolver<'a>,
    schema: IncidentSchema,
}

impl<'a> IncidentAggregator<'a> {
    pub fn new(states: &'a StateCodeTable) -> Self {
        Self::with_schema(states, NIBRS_2020)
    }

    pub fn with_schema(states: &'a StateCodeTable, schema: IncidentSchema) -> Self {
        Self {
            resolver: GeoKeyResolver::new(states),
            schema,
        }
    }

    #[tracing::instrument(level = "info", skip(self, path), fields(path = %path.display()))]
    pub fn aggregate_path(&self, path: &Path) -> Result<Aggregation> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open incident file: {:?}", path))?;
        self.aggregate(file)
            .with_context(|| format!("aggregating {:?}", path))
    }

    /// Single forward pass over a tab-separated incident file.
    ///
    /// Rows that are short, not valid UTF-8, or whose geography cannot be
    /// resolved are logged and skipped; only I/O and header errors abort.
    pub fn aggregate<R: Read>(&self, reader: R) -> Result<Aggregation> {
        let mut rdr = ReaderBuilder::new()
            .delimiter(b'\t')
            .quoting(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = rdr.headers().context("reading incident header")?.clone();
        let cols = self.schema.locate(&headers)?;
        debug!(fields = headers.len(), "incident header located");

        let mut counts = CountsTable::new();
        let mut stats = AggregateStats::default();
        let mut record = StringRecord::new();

        loop {
            match rdr.read_record(&mut record) {
                Ok(true) => {}
                Ok(false) => break,
                Err(err) => {
                    if let csv::ErrorKind::Utf8 { pos, .. } = err.kind() {
                        stats.rows += 1;
                        stats.malformed += 1;
                        warn!(line = ?pos.as_ref().map(|p| p.line()), "skipping non UTF-8 row");
                        continue;
                    }
                    return Err(err).context("reading incident row");
                }
            }
            stats.rows += 1;
            let line = record.position().map(|p| p.line()).unwrap_or(0);

            let Some(offense) = record.get(cols.offense) else {
                stats.malformed += 1;
                warn!(line, fields = record.len(), "skipping short row");
                continue;
            };
            if !is_violent_offense(offense) {
                stats.non_violent += 1;
                continue;
            }

            let victims: Option<Vec<&str>> = cols.victim_race.iter().map(|&i| record.get(i)).collect();
            let offenders: Option<Vec<&str>> =
                cols.offender_race.iter().map(|&i| record.get(i)).collect();
            let (Some(victims), Some(offenders)) = (victims, offenders) else {
                stats.malformed += 1;
                warn!(line, fields = record.len(), "skipping short row");
                continue;
            };

            let direction = Direction::classify(&victims, &offenders);
            if !direction.is_interracial() {
                stats.not_interracial += 1;
                continue;
            }

            let (Some(state), Some(county)) = (record.get(cols.state), record.get(cols.county))
            else {
                stats.malformed += 1;
                warn!(line, fields = record.len(), "skipping short row");
                continue;
            };

            match self.resolver.resolve(state, county) {
                Ok(key) => {
                    counts.record(key, direction);
                    stats.counted += 1;
                }
                Err(err) => {
                    stats.unresolved += 1;
                    warn!(line, error = %err, "skipping row with unresolvable geography");
                }
            }
        }

        info!(
            rows = stats.rows,
            counted = stats.counted,
            counties = counts.len(),
            malformed = stats.malformed,
            unresolved = stats.unresolved,
            "incident file aggregated"
        );
        Ok(Aggregation { counts, stats })
    }
}
