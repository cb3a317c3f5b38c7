//! Code for reading panel data from a CSV file.
use super::{input_err_msg, read_csv};
use crate::id::IDCollection;
use crate::panel::{Panel, PanelRow, Periodicity, parse_period};
use crate::region::{RegionID, RegionMap};
use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::Deserialize;
use std::path::Path;

const PANELS_FILE_NAME: &str = "panels.csv";

/// A row of the panels CSV file
#[derive(Debug, Deserialize, PartialEq)]
struct PanelRecord {
    region_id: String,
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "PDRB")]
    output: f64,
    #[serde(rename = "PMTB")]
    investment: f64,
    #[serde(rename = "Populasi")]
    population: f64,
    #[serde(rename = "Jumlah.Orang.Bekerja")]
    employed: f64,
}

/// Read the panel for every region from the panels CSV file.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
/// * `regions` - All known regions
/// * `periodicity` - How often observations are recorded
///
/// # Returns
///
/// One panel per region, in the same order as `regions`.
pub fn read_panels(
    model_dir: &Path,
    regions: &RegionMap,
    periodicity: Periodicity,
) -> Result<IndexMap<RegionID, Panel>> {
    let file_path = model_dir.join(PANELS_FILE_NAME);
    let records = read_csv::<PanelRecord>(&file_path)?;
    read_panels_from_iter(records, regions, periodicity).with_context(|| input_err_msg(&file_path))
}

fn read_panels_from_iter<I>(
    iter: I,
    regions: &RegionMap,
    periodicity: Periodicity,
) -> Result<IndexMap<RegionID, Panel>>
where
    I: Iterator<Item = PanelRecord>,
{
    let mut rows_by_region: IndexMap<RegionID, Vec<PanelRow>> = IndexMap::new();
    for record in iter {
        let region_id = regions.get_id_by_str(&record.region_id)?;
        let date = parse_period(&record.date)
            .with_context(|| format!("Invalid date for region {region_id}"))?;
        rows_by_region.entry(region_id).or_default().push(PanelRow {
            date,
            output: record.output,
            investment: record.investment,
            population: record.population,
            employed: record.employed,
        });
    }

    regions
        .keys()
        .map(|region_id| {
            let rows = rows_by_region
                .swap_remove(region_id)
                .with_context(|| format!("No panel data provided for region {region_id}"))?;
            let panel = Panel::from_rows(region_id.clone(), periodicity, rows)?;
            Ok((region_id.clone(), panel))
        })
        .collect()
}
