//! The module responsible for writing output data to disk.
use crate::estimation::GrowthAccounts;
use crate::region::RegionID;
use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};
use std::fs;
use std::fs::File;
use std::path::{Path, PathBuf};

pub mod metadata;
use metadata::write_metadata;

/// The root folder in which model-specific output folders will be created
const OUTPUT_DIRECTORY_ROOT: &str = "growth_accounting_results";

/// The output file name for factor shares
const FACTOR_SHARES_FILE_NAME: &str = "factor_shares.csv";

/// Get the model name from the specified directory path
pub fn get_output_dir(model_dir: &Path) -> Result<PathBuf> {
    // Get the model name from the dir path. This ends up being convoluted because we need to check
    // for all possible errors. Ugh.
    let model_dir = model_dir
        .canonicalize() // canonicalise in case the user has specified "."
        .context("Could not resolve path to model")?;

    let model_name = model_dir
        .file_name()
        .context("Model cannot be in root folder")?
        .to_str()
        .context("Invalid chars in model dir name")?;

    // Construct path
    Ok([OUTPUT_DIRECTORY_ROOT, model_name].iter().collect())
}

/// Create a new output directory for the model, optionally overwriting existing data.
///
/// # Arguments
///
/// * `output_dir` - The output directory to create/overwrite
/// * `allow_overwrite` - Whether to delete and recreate the folder if it is non-empty
///
/// # Returns
///
/// True if the output directory was overwritten, false otherwise.
pub fn create_output_directory(output_dir: &Path, allow_overwrite: bool) -> Result<bool> {
    let overwrite = if let Ok(mut it) = fs::read_dir(output_dir) {
        if it.next().is_none() {
            // Folder exists and is empty: nothing to do
            return Ok(false);
        }

        ensure!(
            allow_overwrite,
            "Output folder already exists and is not empty. Please delete the folder or pass the \
            --overwrite command-line option."
        );

        fs::remove_dir_all(output_dir)?;
        true
    } else {
        false
    };

    fs::create_dir_all(output_dir)?;

    Ok(overwrite)
}

/// File name for the per-period growth accounts of a region
fn growth_accounts_file_name(accounts: &GrowthAccounts) -> String {
    format!(
        "growth_accounting_{}_{}.csv",
        accounts.region_id,
        accounts.periodicity.output_label()
    )
}

/// File name for the period averages of a region
fn period_averages_file_name(accounts: &GrowthAccounts) -> String {
    format!(
        "decade_averages_{}_{}.csv",
        accounts.region_id,
        accounts.periodicity.output_label()
    )
}

/// File name for the regression variables of a region
fn regression_variables_file_name(region_id: &RegionID) -> String {
    format!("debug_regression_variables_{region_id}.csv")
}

/// Represents a row in a growth accounts CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct GrowthAccountsRow {
    period: String,
    output_growth: Option<f64>,
    weighted_capital_growth: Option<f64>,
    weighted_labor_growth: Option<f64>,
    tfp_growth: Option<f64>,
    capital_estimate: f64,
    capital_share: f64,
    labor_share: f64,
    tech_share: f64,
}

/// Represents a row in a period averages CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct PeriodAverageRow {
    period: String,
    output_growth: Option<f64>,
    weighted_capital_growth: Option<f64>,
    weighted_labor_growth: Option<f64>,
    tfp_growth: Option<f64>,
}

/// Represents a row in the factor shares CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct FactorShareRow {
    region_id: RegionID,
    periodicity: String,
    capital_share: f64,
    labor_share: f64,
    tech_share: f64,
    alpha: f64,
    r_squared: f64,
    capital_coefficient: f64,
    fit_source: String,
    labor_transform: String,
}

/// Represents a row in a regression variables CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct RegressionVariablesRow {
    period: String,
    output_per_capita: f64,
    capital_output_ratio: f64,
    labor_participation: f64,
}

/// Write a sequence of rows to a new CSV file
fn write_rows<T, I>(file_path: &Path, rows: I) -> Result<()>
where
    T: Serialize,
    I: IntoIterator<Item = T>,
{
    let mut writer = csv::Writer::from_path(file_path)
        .with_context(|| format!("Could not create {}", file_path.display()))?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;

    Ok(())
}

/// An object for writing growth accounts to file
pub struct DataWriter {
    output_path: PathBuf,
    factor_shares_writer: csv::Writer<File>,
    save_debug_info: bool,
}

impl DataWriter {
    /// Open CSV files to write output data to
    ///
    /// # Arguments
    ///
    /// * `output_path` - Folder where files will be saved
    /// * `model_path` - Path to the model which is being run
    /// * `save_debug_info` - Whether to include extra CSV files for debugging model
    pub fn create(output_path: &Path, model_path: &Path, save_debug_info: bool) -> Result<Self> {
        write_metadata(output_path, model_path).context("Failed to save metadata")?;

        let factor_shares_writer = csv::Writer::from_path(output_path.join(FACTOR_SHARES_FILE_NAME))?;

        Ok(Self {
            output_path: output_path.to_path_buf(),
            factor_shares_writer,
            save_debug_info,
        })
    }

    /// Write all outputs for a single region
    pub fn write_growth_accounts(&mut self, accounts: &GrowthAccounts) -> Result<()> {
        self.write_records(accounts)?;
        self.write_period_averages(accounts)?;
        self.write_factor_shares(accounts)?;
        if self.save_debug_info {
            self.write_regression_variables(accounts)?;
        }

        Ok(())
    }

    /// Write one row per period
    fn write_records(&self, accounts: &GrowthAccounts) -> Result<()> {
        let shares = &accounts.shares.shares;
        let rows = accounts.records.iter().map(|record| GrowthAccountsRow {
            period: record.date.to_string(),
            output_growth: record.output_growth,
            weighted_capital_growth: record.weighted_capital_growth,
            weighted_labor_growth: record.weighted_labor_growth,
            tfp_growth: record.tfp_growth,
            capital_estimate: record.capital_estimate,
            capital_share: shares.capital,
            labor_share: shares.labor,
            tech_share: shares.tech,
        });

        write_rows(&self.output_path.join(growth_accounts_file_name(accounts)), rows)
    }

    /// Write one row per period bucket
    fn write_period_averages(&self, accounts: &GrowthAccounts) -> Result<()> {
        let rows = accounts.averages.iter().map(|(label, means)| {
            let [output_growth, weighted_capital_growth, weighted_labor_growth, tfp_growth] =
                *means;
            PeriodAverageRow {
                period: label.clone(),
                output_growth,
                weighted_capital_growth,
                weighted_labor_growth,
                tfp_growth,
            }
        });

        write_rows(&self.output_path.join(period_averages_file_name(accounts)), rows)
    }

    /// Add a row to the factor shares file
    fn write_factor_shares(&mut self, accounts: &GrowthAccounts) -> Result<()> {
        let estimate = &accounts.shares;
        let row = FactorShareRow {
            region_id: accounts.region_id.clone(),
            periodicity: accounts.periodicity.to_string(),
            capital_share: estimate.shares.capital,
            labor_share: estimate.shares.labor,
            tech_share: estimate.shares.tech,
            alpha: estimate.alpha,
            r_squared: estimate.r_squared,
            capital_coefficient: estimate.capital_coefficient,
            fit_source: estimate.source.to_string(),
            labor_transform: accounts.variables.labor_transform.to_string(),
        };
        self.factor_shares_writer.serialize(row)?;

        Ok(())
    }

    /// Write the regression variables for debugging
    fn write_regression_variables(&self, accounts: &GrowthAccounts) -> Result<()> {
        let variables = &accounts.variables;
        let rows = accounts
            .records
            .iter()
            .zip(&variables.output_per_capita)
            .zip(&variables.capital_output_ratio)
            .zip(&variables.labor_participation)
            .map(|(((record, &y), &k), &l)| RegressionVariablesRow {
                period: record.date.to_string(),
                output_per_capita: y,
                capital_output_ratio: k,
                labor_participation: l,
            });

        write_rows(
            &self
                .output_path
                .join(regression_variables_file_name(&accounts.region_id)),
            rows,
        )
    }

    /// Flush the underlying streams
    pub fn flush(&mut self) -> Result<()> {
        self.factor_shares_writer.flush()?;

        Ok(())
    }
}
