//! Fixtures for tests
use crate::panel::{Panel, PanelRow, Periodicity, period_dates};
use crate::region::RegionID;
use rstest::fixture;

/// Assert that an error with the given message occurs
macro_rules! assert_error {
    ($result:expr, $msg:expr) => {
        assert_eq!(
            $result.unwrap_err().chain().next().unwrap().to_string(),
            $msg
        );
    };
}
pub(crate) use assert_error;

/// Employment as a share of population, varying from year to year
const EMPLOYMENT_RATIOS: [f64; 12] = [
    0.41, 0.42, 0.40, 0.43, 0.44, 0.42, 0.45, 0.46, 0.44, 0.47, 0.48, 0.46,
];

/// Multiplicative seasonal factors for output and investment, by quarter
const SEASONAL_FACTORS: [f64; 4] = [0.97, 1.01, 1.04, 0.98];

#[fixture]
pub fn region_id() -> RegionID {
    "JABAR".into()
}

/// Twelve years of annual data starting in 2000
#[fixture]
pub fn annual_panel(region_id: RegionID) -> Panel {
    let dates = period_dates(2000, Periodicity::Annual, EMPLOYMENT_RATIOS.len()).unwrap();
    let rows = dates
        .into_iter()
        .zip(EMPLOYMENT_RATIOS)
        .enumerate()
        .map(|(t, (date, ratio))| {
            let t = t as f64;
            let population = 40_000.0 * 1.015_f64.powf(t);
            PanelRow {
                date,
                output: 1_000.0 * 1.05_f64.powf(t) * (1.0 + 0.02 * (t * 1.3).sin()),
                investment: 220.0 * 1.04_f64.powf(t) * (1.0 + 0.05 * (t * 0.7).cos()),
                population,
                employed: population * ratio,
            }
        });

    Panel::from_rows(region_id, Periodicity::Annual, rows).unwrap()
}

/// Sixteen quarters of data starting in 2010, with a recurring seasonal pattern in the flows
#[fixture]
pub fn quarterly_panel(region_id: RegionID) -> Panel {
    let dates = period_dates(2010, Periodicity::Quarterly, 16).unwrap();
    let rows = dates.into_iter().enumerate().map(|(t, date)| {
        let season = SEASONAL_FACTORS[t % 4];
        let ratio = EMPLOYMENT_RATIOS[t % EMPLOYMENT_RATIOS.len()];
        let t = t as f64;
        let population = 40_000.0 * 1.004_f64.powf(t);
        PanelRow {
            date,
            output: 250.0 * 1.012_f64.powf(t) * season,
            investment: 55.0 * 1.01_f64.powf(t) * season * (1.0 + 0.03 * (t * 0.9).sin()),
            population,
            employed: population * ratio,
        }
    });

    Panel::from_rows(region_id, Periodicity::Quarterly, rows).unwrap()
}
