//! The growth accounting pipeline, for a single panel and for every region in a model.
use crate::capital::{CapitalMethod, CapitalParameters, CapitalSeries};
use crate::growth::{GrowthRecord, decompose_growth};
use crate::model::Model;
use crate::output::DataWriter;
use crate::panel::{Panel, Periodicity, first_year};
use crate::periods::{
    PeriodAverages, PeriodBucket, average_by_period, default_decade_buckets, relabel_records,
};
use crate::region::RegionID;
use crate::seasonal::{StlParameters, seasonally_adjust};
use crate::shares::{RegressionOptions, ShareEstimate, estimate_shares};
use crate::variables::{
    LaborTransformPolicy, RegressionVariables, UndefinedValuePolicy, build_variables,
};
use anyhow::{Context, Result, ensure};
use itertools::Itertools;
use log::{debug, error, info};
use std::path::Path;

/// Options controlling every stage of the pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct EstimationOptions {
    /// How to accumulate the capital stock
    pub capital_method: CapitalMethod,
    /// Depreciation and saving rates
    pub capital_parameters: CapitalParameters,
    /// Number of periods over which growth is measured
    pub lag: usize,
    /// STL parameters, if flow series should be seasonally adjusted
    pub seasonal_adjustment: Option<StlParameters>,
    /// How to treat undefined regression variables
    pub undefined_values: UndefinedValuePolicy,
    /// How to choose the labour transform
    pub labor_transform: LaborTransformPolicy,
    /// Options for the factor-share regression
    pub regression: RegressionOptions,
    /// First year of the synthetic date index used for period averages. Defaults to the year of
    /// the panel's first period.
    pub start_year: Option<i32>,
    /// Buckets for period averages
    pub period_buckets: Vec<PeriodBucket>,
}

impl EstimationOptions {
    /// Default options for annual panels
    pub fn annual() -> Self {
        Self::for_periodicity(Periodicity::Annual)
    }

    /// Default options for quarterly panels
    pub fn quarterly() -> Self {
        Self::for_periodicity(Periodicity::Quarterly)
    }

    /// Default options for panels of the given periodicity.
    ///
    /// Quarterly panels are seasonally adjusted and measure growth against the same quarter of the
    /// previous year.
    pub fn for_periodicity(periodicity: Periodicity) -> Self {
        Self {
            capital_method: CapitalMethod::default(),
            capital_parameters: CapitalParameters::default(),
            lag: periodicity.default_lag(),
            seasonal_adjustment: (periodicity == Periodicity::Quarterly)
                .then(StlParameters::default),
            undefined_values: UndefinedValuePolicy::default(),
            labor_transform: LaborTransformPolicy::default(),
            regression: RegressionOptions::default(),
            start_year: None,
            period_buckets: default_decade_buckets(),
        }
    }
}

/// The growth accounts estimated for one region
#[derive(Debug, Clone, PartialEq)]
pub struct GrowthAccounts {
    /// The region
    pub region_id: RegionID,
    /// Periodicity of the underlying panel
    pub periodicity: Periodicity,
    /// The estimated capital stock
    pub capital: CapitalSeries,
    /// The regression variables the shares were estimated from
    pub variables: RegressionVariables,
    /// The estimated factor shares
    pub shares: ShareEstimate,
    /// One record per period of the panel
    pub records: Vec<GrowthRecord>,
    /// Mean growth in each period bucket
    pub averages: PeriodAverages,
}

/// Replace output and investment with their seasonally adjusted values
fn adjust_flows(panel: &Panel, parameters: &StlParameters) -> Result<Panel> {
    ensure!(
        panel.periodicity() == Periodicity::Quarterly,
        "Seasonal adjustment can only be applied to quarterly panels"
    );

    let output = seasonally_adjust(panel.output(), parameters)
        .context("Failed to seasonally adjust PDRB")?;
    let investment = seasonally_adjust(panel.investment(), parameters)
        .context("Failed to seasonally adjust PMTB")?;

    panel.with_flows(output, investment)
}

/// Run the full growth accounting pipeline for a single panel.
///
/// # Arguments
///
/// * `panel` - Raw levels for one region
/// * `options` - Options for each stage of the pipeline
pub fn estimate_growth_accounts(
    panel: &Panel,
    options: &EstimationOptions,
) -> Result<GrowthAccounts> {
    let adjusted;
    let panel = match &options.seasonal_adjustment {
        Some(parameters) => {
            debug!("Region {}: seasonally adjusting flows", panel.region_id());
            adjusted = adjust_flows(panel, parameters)?;
            &adjusted
        }
        None => panel,
    };

    debug!(
        "Region {}: estimating capital stock with {} method",
        panel.region_id(),
        options.capital_method
    );
    let capital = options
        .capital_method
        .estimate(panel, &options.capital_parameters);

    let variables = build_variables(
        panel,
        &capital,
        options.labor_transform,
        options.undefined_values,
    )?;
    let shares = estimate_shares(&variables, &options.regression)?;

    let records = decompose_growth(
        panel.dates(),
        panel.output(),
        capital.values(),
        panel.employed(),
        &shares.shares,
        options.lag,
    )?;

    let mut relabelled = records.clone();
    let start_year = options.start_year.unwrap_or_else(|| first_year(panel));
    relabel_records(&mut relabelled, start_year, panel.periodicity())?;
    let averages = average_by_period(&relabelled, &options.period_buckets);

    Ok(GrowthAccounts {
        region_id: panel.region_id().clone(),
        periodicity: panel.periodicity(),
        capital,
        variables,
        shares,
        records,
        averages,
    })
}

/// Estimate growth accounts for every region in the model and write the results.
///
/// A failure for one region is logged and the remaining regions are still processed.
///
/// # Arguments
///
/// * `model` - The model to run
/// * `output_path` - The folder to which output files will be written
/// * `debug_model` - Whether to write additional information (e.g. regression variables) to
///   output files
pub fn run(model: &Model, output_path: &Path, debug_model: bool) -> Result<()> {
    let mut writer = DataWriter::create(output_path, &model.model_path, debug_model)?;
    let options = model.parameters.estimation_options();

    let mut failed = Vec::new();
    for (region_id, panel) in &model.panels {
        info!(
            "Estimating growth accounts for region {region_id} ({} periods)",
            panel.len()
        );

        let accounts = match estimate_growth_accounts(panel, &options) {
            Ok(accounts) => accounts,
            Err(err) => {
                error!("Failed to estimate growth accounts for region {region_id}: {err:?}");
                failed.push(region_id);
                continue;
            }
        };

        let shares = &accounts.shares.shares;
        info!(
            "Region {region_id}: capital share {:.2}%, labour share {:.2}%, tech share {:.2}% \
            (R² = {:.4})",
            shares.capital, shares.labor, shares.tech, accounts.shares.r_squared
        );
        writer.write_growth_accounts(&accounts)?;
    }

    writer.flush()?;

    ensure!(
        failed.is_empty(),
        "Growth accounts could not be estimated for {} region(s): {}",
        failed.len(),
        failed.iter().join(", ")
    );

    Ok(())
}
