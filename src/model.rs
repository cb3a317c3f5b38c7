//! The model represents the static input data provided by the user.
use crate::panel::Panel;
use crate::region::{RegionID, RegionMap};
use indexmap::IndexMap;
use std::path::PathBuf;

pub mod parameters;
pub use parameters::ModelParameters;

/// Model definition
pub struct Model {
    /// Path to model folder
    pub model_path: PathBuf,
    /// Parameters from the model TOML file
    pub parameters: ModelParameters,
    /// Regions for the model
    pub regions: RegionMap,
    /// The panel for each region, in the same order as `regions`
    pub panels: IndexMap<RegionID, Panel>,
}
