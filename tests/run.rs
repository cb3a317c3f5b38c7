//! Integration tests for the `run` command.
use growth_accounting::cli::{RunOpts, handle_run_command};
use growth_accounting::settings::Settings;
use std::path::PathBuf;
use tempfile::tempdir;

/// Get the path to the example model.
fn get_model_dir() -> PathBuf {
    PathBuf::from("demos/simple")
}

/// An integration test for the `run` command.
#[test]
fn test_handle_run_command() {
    unsafe { std::env::set_var("GROWTH_ACCOUNTING_LOG_LEVEL", "off") };

    // Save results to non-existent directory to check that directory creation works
    let tempdir = tempdir().unwrap();
    let output_dir = tempdir.path().join("results");
    let opts = RunOpts {
        output_dir: Some(output_dir.clone()),
        overwrite: false,
        debug_model: true,
    };
    handle_run_command(&get_model_dir(), &opts, Some(Settings::default())).unwrap();

    for file_name in [
        "metadata.toml",
        "factor_shares.csv",
        "growth_accounting_JABAR_Tahunan.csv",
        "decade_averages_BALI_Tahunan.csv",
        "debug_regression_variables_JATENG.csv",
        "growth_accounting_info.log",
    ] {
        assert!(output_dir.join(file_name).is_file(), "Missing {file_name}");
    }

    // One header row plus one row per region
    let factor_shares = std::fs::read_to_string(output_dir.join("factor_shares.csv")).unwrap();
    assert_eq!(factor_shares.lines().count(), 4);

    // Second time will fail because the logging is already initialised
    let opts = RunOpts {
        output_dir: Some(tempdir.path().join("results2")),
        ..Default::default()
    };
    assert_eq!(
        handle_run_command(&get_model_dir(), &opts, Some(Settings::default()))
            .unwrap_err()
            .chain()
            .next()
            .unwrap()
            .to_string(),
        "Failed to initialise logging."
    );
}
