// src/pipeline.rs

use anyhow::Result;
use std::{io::Read, path::Path};

use crate::aggregate::{AggregateStats, Aggregation, IncidentAggregator, IncidentSchema};
use crate::ratio::{JoinedTable, LogLogFit, RatioDeriver, StateSummary};
use crate::reference::ReferenceTableCache;

/// Everything one run produces.
#[derive(Debug)]
pub struct PipelineOutput {
    pub stats: AggregateStats,
    pub table: JoinedTable,
    pub states: Vec<StateSummary>,
    pub fit: Option<LogLogFit>,
}

/// Aggregate the incident file at `path` and join it with the reference tables.
pub fn run(path: &Path, cache: &ReferenceTableCache) -> Result<PipelineOutput> {
    let states = cache.state_codes()?;
    let aggregation = IncidentAggregator::new(states).aggregate_path(path)?;
    finish(aggregation, cache)
}

pub fn run_reader<R: Read>(
    reader: R,
    schema: IncidentSchema,
    cache: &ReferenceTableCache,
) -> Result<PipelineOutput> {
    let states = cache.state_codes()?;
    let aggregation = IncidentAggregator::with_schema(states, schema).aggregate(reader)?;
    finish(aggregation, cache)
}

fn finish(aggregation: Aggregation, cache: &ReferenceTableCache) -> Result<PipelineOutput> {
    let Aggregation { counts, stats } = aggregation;
    let deriver = RatioDeriver::new(cache.county_race_pop()?);
    let table = deriver.derive(&counts);
    let states = deriver.state_rollup(&counts, cache.state_codes()?);
    let fit = table.fit();
    Ok(PipelineOutput {
        stats,
        table,
        states,
        fit,
    })
}
