//! Explicit central difference integration of the broadband-forced model.
//!
//! The model is driven by a sum of sines spanning the frequency band,
//! integrated with the diagonal mass matrix, and the surface transfer
//! compliance is recovered afterwards by Welch estimation between the
//! forcing trace and the recorded surface displacements.

use indicatif::ProgressBar;
use nalgebra::DVector;

use crate::{
    assembler::GlobalSystem,
    datatypes::{EquationMap, Mesh, RunConfig, TransferResult},
    error::GroundwaveError,
    report::Report,
    solver, spectral,
};

/// Sign function with a zero at zero, so a resting DOF sees no
/// hysteretic force
fn sign(value: f64) -> f64 {
    if value > 0.0 {
        1.0
    } else if value < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// One acceleration evaluation of the central difference scheme
///
/// The hysteretic damping force is displacement-proportional but opposes
/// the current direction of motion, which keeps the energy loss per cycle
/// independent of frequency.
pub fn acceleration(
    system: &GlobalSystem,
    inv_mass: &DVector<f64>,
    disp: &DVector<f64>,
    vel: &DVector<f64>,
    force_magnitude: f64,
) -> DVector<f64> {
    let hysteretic = disp.zip_map(vel, |u, v| u.abs() * sign(v));

    let mut residual = &system.force * force_magnitude;
    residual -= &system.stiffness * disp;
    residual -= &system.hyst_damp * &hysteretic;
    residual -= &system.inf_damp * vel;

    residual.component_mul(inv_mass)
}

/// Runs the explicit simulation and estimates the transfer compliance
///
/// # Arguments
/// * `mesh` - The generated mesh
/// * `map` - The node-to-equation mapping
/// * `system` - Assembled stiffness, damping and force
/// * `lumped_mass` - Diagonal of the lumped mass matrix
/// * `config` - The run configuration
/// * `report` - Audit trail of the run
///
/// # Returns
/// The transfer compliance at the surface nodes over the configured band
pub fn solve(
    mesh: &Mesh,
    map: &EquationMap,
    system: &GlobalSystem,
    lumped_mass: &DVector<f64>,
    config: &RunConfig,
    report: &Report,
) -> Result<TransferResult, GroundwaveError> {
    let sampling = solver::time_sampling(config, &system.stiffness, lumped_mass)?;
    let output_number = sampling.total_steps / sampling.output_interval;

    report.explicit_started(&sampling)?;
    println!(
        "info: integrating {} steps of {:.6e} s",
        sampling.total_steps, sampling.time_step
    );

    let terms = solver::forcing_terms(config);
    let inv_mass = lumped_mass.map(|m| 1.0 / m);

    let surface: Vec<usize> = mesh.surface_nodes().collect();
    // leading zero sample at t = 0
    let samples = output_number + 1;
    let mut force_history = vec![0.0f64; samples];
    let mut disp_history_r = vec![vec![0.0f64; samples]; surface.len()];
    let mut disp_history_z = vec![vec![0.0f64; samples]; surface.len()];

    let mut disp: DVector<f64> = DVector::zeros(system.neq);
    let mut vel: DVector<f64> = DVector::zeros(system.neq);

    let bar = ProgressBar::new(sampling.total_steps as u64);
    let mut recorded = 1usize;
    for step in 0..sampling.total_steps {
        let time = (step + 1) as f64 * sampling.time_step;
        let magnitude = solver::forcing_amplitude(&terms, time);

        let acc = acceleration(system, &inv_mass, &disp, &vel, magnitude);
        vel += &acc * sampling.time_step;
        disp += &vel * sampling.time_step;

        if (step + 1) % sampling.output_interval == 0 {
            let solution = disp.as_slice();
            for (i, &node) in surface.iter().enumerate() {
                disp_history_r[i][recorded] = map.dofs[node][0].read(solution);
                disp_history_z[i][recorded] = map.dofs[node][1].read(solution);
            }
            force_history[recorded] = magnitude;
            recorded += 1;
            bar.inc(sampling.output_interval as u64);
        }
    }
    bar.finish();

    if !disp.iter().all(|u| u.is_finite()) {
        return Err(GroundwaveError::Solver(
            "Error: explicit integration diverged; reduce TimeIncrementFactor\n".to_owned(),
        ));
    }

    let fs = 1.0 / (sampling.time_step * sampling.output_interval as f64);
    let nperseg = samples / 2;
    let noverlap = samples / 4;

    let mut frequencies = Vec::new();
    let mut band = (0usize, 0usize);
    let mut r_real = Vec::with_capacity(surface.len());
    let mut r_imag = Vec::with_capacity(surface.len());
    let mut z_real = Vec::with_capacity(surface.len());
    let mut z_imag = Vec::with_capacity(surface.len());

    for i in 0..surface.len() {
        let (bins, transfer_r) =
            spectral::transfer_function(&force_history, &disp_history_r[i], fs, nperseg, noverlap)?;
        let (_, transfer_z) =
            spectral::transfer_function(&force_history, &disp_history_z[i], fs, nperseg, noverlap)?;

        if frequencies.is_empty() {
            let lo = bins.iter().position(|f| *f >= config.low_freq).ok_or_else(|| {
                GroundwaveError::Solver(
                    "Error: spectral resolution does not reach the frequency band\n".to_owned(),
                )
            })?;
            let hi = bins.iter().rposition(|f| *f <= config.high_freq).ok_or_else(|| {
                GroundwaveError::Solver(
                    "Error: spectral resolution does not reach the frequency band\n".to_owned(),
                )
            })?;
            band = (lo, hi);
            frequencies = bins[lo..=hi].to_vec();
        }

        r_real.push(transfer_r[band.0..=band.1].iter().map(|h| h.re).collect());
        r_imag.push(transfer_r[band.0..=band.1].iter().map(|h| h.im).collect());
        z_real.push(transfer_z[band.0..=band.1].iter().map(|h| h.re).collect());
        z_imag.push(transfer_z[band.0..=band.1].iter().map(|h| h.im).collect());
    }

    report.calculation_ended()?;

    Ok(TransferResult {
        frequency: frequencies,
        rcoord: surface.iter().map(|&n| mesh.nodes[n].r).collect(),
        r_disp_real: r_real,
        r_disp_imag: r_imag,
        z_disp_real: z_real,
        z_disp_imag: z_imag,
        max_freq_limited: (mesh.max_freq_limited != config.high_freq)
            .then_some(mesh.max_freq_limited),
    })
}
