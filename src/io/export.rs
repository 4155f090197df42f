//! Exports: trajectory and sweep CSVs, fit-result JSON.
//!
//! CSVs are plain numeric tables for spreadsheets or plotting scripts. The
//! JSON file is the portable record of a fit: the run setup, the `FitResult`
//! and the peak of the fitted trajectory.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;

use crate::domain::{FitResult, ObservationSeries, PeakStats, Trajectory};
use crate::error::AppError;
use crate::fit::SweepPoint;
use crate::models::SimConfig;

/// Schema of the fit JSON file.
#[derive(Debug, Clone, Serialize)]
pub struct FitFile<'a> {
    pub tool: &'static str,
    pub population: f64,
    pub initial_infected: f64,
    pub duration_days: u32,
    pub resolution: u32,
    pub fit: &'a FitResult,
    pub peak: Option<PeakStats>,
}

impl<'a> FitFile<'a> {
    pub fn new(config: &SimConfig, fit: &'a FitResult, trajectory: Option<&Trajectory>) -> Self {
        Self {
            tool: "sirfit",
            population: config.population,
            initial_infected: config.initial_infected,
            duration_days: config.duration_days,
            resolution: config.resolution,
            fit,
            peak: trajectory.map(Trajectory::peak),
        }
    }
}

fn create(path: &Path, what: &str) -> Result<BufWriter<File>, AppError> {
    File::create(path)
        .map(BufWriter::new)
        .map_err(|e| AppError::new(2, format!("Failed to create {what} '{}': {e}", path.display())))
}

/// Write `t,S,I,R` rows.
pub fn write_trajectory_csv(path: &Path, traj: &Trajectory) -> Result<(), AppError> {
    let mut file = create(path, "trajectory CSV")?;
    let io_err = |e: std::io::Error| AppError::new(2, format!("Failed to write trajectory CSV: {e}"));

    writeln!(file, "t,S,I,R").map_err(io_err)?;
    for k in 0..traj.len() {
        writeln!(
            file,
            "{:.4},{:.6},{:.6},{:.6}",
            traj.t[k], traj.s[k], traj.i[k], traj.r[k]
        )
        .map_err(io_err)?;
    }
    file.flush().map_err(io_err)?;
    Ok(())
}

/// Write `beta,peak_infected,peak_day,final_recovered` rows.
pub fn write_sweep_csv(path: &Path, points: &[SweepPoint]) -> Result<(), AppError> {
    let mut file = create(path, "sweep CSV")?;
    let io_err = |e: std::io::Error| AppError::new(2, format!("Failed to write sweep CSV: {e}"));

    writeln!(file, "beta,peak_infected,peak_day,final_recovered").map_err(io_err)?;
    for p in points {
        writeln!(
            file,
            "{:.6},{:.6},{:.4},{:.6}",
            p.beta, p.peak_infected, p.peak_day, p.final_recovered
        )
        .map_err(io_err)?;
    }
    file.flush().map_err(io_err)?;
    Ok(())
}

/// Write `day,active` rows in the format `load_observations` reads.
pub fn write_observations_csv(path: &Path, series: &ObservationSeries) -> Result<(), AppError> {
    let mut file = create(path, "observation CSV")?;
    let io_err = |e: std::io::Error| AppError::new(2, format!("Failed to write observation CSV: {e}"));

    writeln!(file, "day,active").map_err(io_err)?;
    for p in series.points() {
        writeln!(file, "{},{}", p.day, p.active).map_err(io_err)?;
    }
    file.flush().map_err(io_err)?;
    Ok(())
}

/// Write any serializable value as pretty JSON.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), AppError> {
    let file = create(path, "JSON")?;
    serde_json::to_writer_pretty(file, value)
        .map_err(|e| AppError::new(2, format!("Failed to write JSON '{}': {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SirModel, Simulator};

    #[test]
    fn trajectory_csv_has_header_and_all_rows() {
        let config = SimConfig::new(1000.0, 1.0, 5, 2).unwrap();
        let traj = Simulator::new(SirModel::constant())
            .run(&[0.3, 0.1], &config)
            .unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("traj.csv");
        write_trajectory_csv(&path, &traj).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "t,S,I,R");
        assert_eq!(lines.len(), 1 + 11);
        assert!(lines[1].starts_with("0.0000,999.000000,1.000000,0.000000"));
    }

    #[test]
    fn observation_csv_reloads() {
        use crate::domain::Observation;
        use crate::io::ingest::load_observations;

        let series = ObservationSeries::new(vec![
            Observation { day: 0, active: 3.0 },
            Observation { day: 4, active: 12.25 },
        ])
        .unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("obs.csv");
        write_observations_csv(&path, &series).unwrap();
        assert_eq!(load_observations(&path).unwrap().series, series);
    }

    #[test]
    fn fit_json_carries_setup_and_peak() {
        use crate::fit::derive_quantities;
        use crate::domain::ModelKind;

        let config = SimConfig::new(1000.0, 1.0, 160, 1).unwrap();
        let traj = Simulator::new(SirModel::constant())
            .run(&[0.3, 0.1], &config)
            .unwrap();
        let fit = FitResult {
            model: ModelKind::Constant,
            display_name: "constant beta".to_string(),
            param_names: vec!["beta".to_string(), "gamma".to_string()],
            params: vec![0.3, 0.1],
            intervention_day: None,
            derived: derive_quantities(ModelKind::Constant, &[0.3, 0.1]).unwrap(),
            sse: 1.5,
            rmse: 0.5,
            n_obs: 6,
            success: true,
            message: "ok".to_string(),
            strategy: "multi-start".to_string(),
            evaluations: 10,
        };
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fit.json");
        write_json(&path, &FitFile::new(&config, &fit, Some(&traj))).unwrap();

        let v: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(v["tool"], "sirfit");
        assert_eq!(v["fit"]["model"], "constant");
        assert_eq!(v["fit"]["derived"]["intervention_effectiveness"], serde_json::Value::Null);
        assert!(v["peak"]["peak_infected"].as_f64().unwrap() > 295.0);
    }
}
