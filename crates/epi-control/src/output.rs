// ─────────────────────────────────────────────────────────────────────
// SCPN Epidemic Control — CSV Output
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Per-step tables of one experiment: `mean_std.csv` with the aggregated
//! estimates and `<run+1>.csv` per estimator run.

use epi_types::error::EpiResult;
use epi_types::state::SimulationState;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub const MEAN_STD_FILE: &str = "mean_std.csv";

/// Column names of `mean_std.csv`.
pub fn mean_std_header(has_data_stage: bool) -> Vec<&'static str> {
    let mut cols = vec![
        "Time",
        "S_true",
        "I_true",
        "R_true",
        "I_observation",
        "S_mean",
        "I_mean",
        "R_mean",
        "U_mean",
        "S_std",
        "I_std",
        "R_std",
        "U_std",
        "beta_true",
        "beta_mean",
        "beta_std",
        "u_actual",
        "time_ode_used_mean",
    ];
    if has_data_stage {
        cols.push("time_data_used_mean");
    }
    cols.push("loss_mean");
    cols
}

/// Column names of a per-run file.
pub fn run_header(has_data_stage: bool) -> Vec<&'static str> {
    let mut cols = vec![
        "Time",
        "S_true",
        "I_true",
        "R_true",
        "I_observation",
        "S_est",
        "I_est",
        "R_est",
        "U_est",
        "beta_est",
        "beta_true",
        "u_actual",
        "time_ode_used",
    ];
    if has_data_stage {
        cols.push("time_data_used");
    }
    cols.push("loss_ode");
    cols
}

fn truth_columns(state: &SimulationState, k: usize) -> [f64; 4] {
    [
        state.s_true[k],
        state.i_true[k],
        state.r_true[k],
        state.i_observation[k],
    ]
}

fn write_rows<F>(path: &Path, header: &[&str], n_steps: usize, mut row: F) -> EpiResult<()>
where
    F: FnMut(usize) -> Vec<f64>,
{
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(header)?;
    for k in 0..n_steps {
        let mut record = vec![k.to_string()];
        record.extend(row(k).iter().map(f64::to_string));
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Write the aggregated table.
pub fn write_mean_std(
    path: &Path,
    state: &SimulationState,
    beta_true: f64,
    has_data_stage: bool,
) -> EpiResult<()> {
    let agg = &state.aggregate;
    write_rows(path, &mean_std_header(has_data_stage), state.n_steps(), |k| {
        let mut row = truth_columns(state, k).to_vec();
        row.extend([
            agg.s.mean[k],
            agg.i.mean[k],
            agg.r.mean[k],
            agg.u.mean[k],
            agg.s.std[k],
            agg.i.std[k],
            agg.r.std[k],
            agg.u.std[k],
            beta_true,
            agg.beta.mean[k],
            agg.beta.std[k],
            state.u_used[k],
            agg.time_ode[k],
        ]);
        if has_data_stage {
            row.push(agg.time_data[k]);
        }
        row.push(agg.loss[k]);
        row
    })
}

/// Write the column of estimator run `run`.
pub fn write_run(
    path: &Path,
    state: &SimulationState,
    run: usize,
    beta_true: f64,
    has_data_stage: bool,
) -> EpiResult<()> {
    let t = &state.runs;
    write_rows(path, &run_header(has_data_stage), state.n_steps(), |k| {
        let mut row = truth_columns(state, k).to_vec();
        row.extend([
            t.s[[k, run]],
            t.i[[k, run]],
            t.r[[k, run]],
            t.u[[k, run]],
            t.beta[[k, run]],
            beta_true,
            state.u_used[k],
            t.time_ode[[k, run]],
        ]);
        if has_data_stage {
            row.push(t.time_data[[k, run]]);
        }
        row.push(t.loss[[k, run]]);
        row
    })
}

/// Write `mean_std.csv` and one file per run into `dir`, creating it if
/// needed. Returns the written paths, aggregate first.
pub fn write_outputs(
    dir: &Path,
    state: &SimulationState,
    beta_true: f64,
    has_data_stage: bool,
) -> EpiResult<Vec<PathBuf>> {
    fs::create_dir_all(dir)?;
    let mut written = Vec::with_capacity(state.runs.num_runs() + 1);

    let path = dir.join(MEAN_STD_FILE);
    write_mean_std(&path, state, beta_true, has_data_stage)?;
    written.push(path);

    for run in 0..state.runs.num_runs() {
        let path = dir.join(format!("{}.csv", run + 1));
        write_run(&path, state, run, beta_true, has_data_stage)?;
        written.push(path);
    }
    info!(dir = %dir.display(), files = written.len(), "results written");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use epi_types::state::SirState;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_dir(stem: &str) -> PathBuf {
        let epoch_ns = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!("{stem}_{}_{}", std::process::id(), epoch_ns))
    }

    fn sample_state() -> SimulationState {
        let mut state = SimulationState::new(4, 2);
        for k in 0..5 {
            state.set_true_state(k, SirState::new(0.9 - 0.1 * k as f64, 0.1, 0.1 * k as f64));
        }
        state.u_used[2] = 0.25;
        state.runs.beta[[3, 1]] = 0.55;
        state.runs.loss[[4, 0]] = 1e-3;
        state.aggregate.beta.mean[3] = 0.5;
        state
    }

    #[test]
    fn test_headers_follow_variant() {
        assert_eq!(mean_std_header(false).len(), 19);
        assert_eq!(mean_std_header(true).len(), 20);
        assert_eq!(mean_std_header(true)[18], "time_data_used_mean");
        assert_eq!(run_header(false).last(), Some(&"loss_ode"));
        assert_eq!(run_header(true)[13], "time_data_used");
    }

    #[test]
    fn test_write_outputs_layout() {
        let dir = temp_dir("epi_output");
        let state = sample_state();
        let paths = write_outputs(&dir, &state, 0.6, false).unwrap();
        assert_eq!(paths.len(), 3);
        assert!(paths[0].ends_with("mean_std.csv"));
        assert!(paths[2].ends_with("2.csv"));

        let mut rdr = csv::Reader::from_path(&paths[0]).unwrap();
        let header: Vec<String> = rdr.headers().unwrap().iter().map(String::from).collect();
        assert_eq!(header, mean_std_header(false));
        let rows: Vec<csv::StringRecord> = rdr.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 5);
        assert_eq!(&rows[2][16], "0.25");
        assert_eq!(&rows[3][14], "0.5");

        let mut rdr = csv::Reader::from_path(&paths[2]).unwrap();
        let rows: Vec<csv::StringRecord> = rdr.records().map(|r| r.unwrap()).collect();
        assert_eq!(&rows[3][9], "0.55");
        assert_eq!(&rows[3][10], "0.6");
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_two_stage_column_written() {
        let dir = temp_dir("epi_output_two_stage");
        let mut state = sample_state();
        state.runs.time_data[[4, 0]] = 2.5;
        let paths = write_outputs(&dir, &state, 0.6, true).unwrap();
        let mut rdr = csv::Reader::from_path(&paths[1]).unwrap();
        assert_eq!(rdr.headers().unwrap().len(), 15);
        let rows: Vec<csv::StringRecord> = rdr.records().map(|r| r.unwrap()).collect();
        assert_eq!(&rows[4][13], "2.5");
        assert_eq!(&rows[4][14], "0.001");
        let _ = fs::remove_dir_all(dir);
    }
}
