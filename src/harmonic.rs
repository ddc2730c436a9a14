//! Direct harmonic response analysis over the frequency sweep.
//!
//! At each angular frequency the complex system
//! `(-w^2 M + K + i (w Cv + Ch)) u = F` is rewritten as a real system of
//! twice the size with the real and imaginary parts stacked, and solved
//! with a sparse LU factorization. The sparsity pattern is identical at
//! every frequency, so the symbolic analysis is done once and only the
//! numeric factorization repeats.

use faer::linalg::solvers::Solve;
use faer::prelude::*;
use faer::sparse::{self, SparseColMat, Triplet};
use indicatif::ProgressBar;
use nalgebra_sparse::csr::CsrMatrix;

use crate::{
    assembler::GlobalSystem,
    datatypes::{Dof, EquationMap, Mesh, RunConfig, TransferResult},
    error::GroundwaveError,
    report::Report,
    solver,
};

/// Triplets of the stacked real 2N x 2N system at one angular frequency
///
/// Duplicate positions are summed on matrix creation, so each source
/// matrix contributes its entries independently. The triplet ordering does
/// not depend on the frequency, which keeps the assembled sparsity pattern
/// stable across the sweep.
fn block_triplets(
    system: &GlobalSystem,
    mass: &CsrMatrix<f64>,
    omega: f64,
) -> Vec<Triplet<usize, usize, f64>> {
    let n = system.neq;
    let nnz = 2 * (system.stiffness.nnz() + mass.nnz() + system.hyst_damp.nnz())
        + 2 * system.inf_damp.nnz();
    let mut triplets = Vec::with_capacity(nnz);

    // real blocks: K - w^2 M on both diagonals
    for (i, j, v) in system.stiffness.triplet_iter() {
        triplets.push(Triplet::new(i, j, *v));
        triplets.push(Triplet::new(i + n, j + n, *v));
    }
    for (i, j, v) in mass.triplet_iter() {
        triplets.push(Triplet::new(i, j, -omega * omega * v));
        triplets.push(Triplet::new(i + n, j + n, -omega * omega * v));
    }

    // imaginary blocks: w Cv + Ch off the diagonal, skew placed
    for (i, j, v) in system.hyst_damp.triplet_iter() {
        triplets.push(Triplet::new(i, j + n, -*v));
        triplets.push(Triplet::new(i + n, j, *v));
    }
    for (i, j, v) in system.inf_damp.triplet_iter() {
        triplets.push(Triplet::new(i, j + n, -omega * v));
        triplets.push(Triplet::new(i + n, j, omega * v));
    }

    triplets
}

fn block_matrix(
    system: &GlobalSystem,
    mass: &CsrMatrix<f64>,
    omega: f64,
) -> Result<SparseColMat<usize, f64>, GroundwaveError> {
    let n2 = 2 * system.neq;
    SparseColMat::try_new_from_triplets(n2, n2, &block_triplets(system, mass, omega)).map_err(
        |err| {
            GroundwaveError::Solver(format!(
                "Error: could not assemble harmonic system: {:?}\n",
                err
            ))
        },
    )
}

fn stacked_force(system: &GlobalSystem) -> Col<f64> {
    let n = system.neq;
    Col::from_fn(2 * n, |i| if i < n { system.force[i] } else { 0.0 })
}

/// Solves the harmonic response at a single angular frequency
///
/// Used by the method selector to time one factorization; the sweep in
/// [`solve`] shares the symbolic analysis instead.
pub fn solve_single(
    system: &GlobalSystem,
    mass: &CsrMatrix<f64>,
    omega: f64,
) -> Result<Col<f64>, GroundwaveError> {
    let matrix = block_matrix(system, mass, omega)?;
    let symbolic = sparse::linalg::solvers::SymbolicLu::try_new(matrix.symbolic()).map_err(
        |err| GroundwaveError::Solver(format!("Error: symbolic LU failed: {:?}\n", err)),
    )?;
    let lu = sparse::linalg::solvers::Lu::try_new_with_symbolic(symbolic, matrix.as_ref())
        .map_err(|err| {
            GroundwaveError::Solver(format!("Error: sparse LU failed: {:?}\n", err))
        })?;

    let mut rhs = stacked_force(system);
    lu.solve_in_place(rhs.as_mut());
    Ok(rhs)
}

/// Sweeps the frequency band and collects the surface transfer compliance
///
/// # Arguments
/// * `mesh` - The generated mesh
/// * `map` - The node-to-equation mapping
/// * `system` - Assembled stiffness, damping and force
/// * `mass` - Global consistent mass matrix
/// * `config` - The run configuration
/// * `report` - Audit trail of the run
pub fn solve(
    mesh: &Mesh,
    map: &EquationMap,
    system: &GlobalSystem,
    mass: &CsrMatrix<f64>,
    config: &RunConfig,
    report: &Report,
) -> Result<TransferResult, GroundwaveError> {
    let frequencies = solver::frequency_sampling(config);
    report.harmonic_started(frequencies.len())?;
    println!(
        "info: sweeping {} frequencies from {:.3} to {:.3} Hz",
        frequencies.len(),
        frequencies[0],
        frequencies[frequencies.len() - 1]
    );

    let surface: Vec<usize> = mesh.surface_nodes().collect();
    let mut r_real = vec![Vec::with_capacity(frequencies.len()); surface.len()];
    let mut r_imag = vec![Vec::with_capacity(frequencies.len()); surface.len()];
    let mut z_real = vec![Vec::with_capacity(frequencies.len()); surface.len()];
    let mut z_imag = vec![Vec::with_capacity(frequencies.len()); surface.len()];

    let first = block_matrix(system, mass, 2.0 * std::f64::consts::PI * frequencies[0])?;
    let symbolic = sparse::linalg::solvers::SymbolicLu::try_new(first.symbolic()).map_err(
        |err| GroundwaveError::Solver(format!("Error: symbolic LU failed: {:?}\n", err)),
    )?;

    let n = system.neq;
    let bar = ProgressBar::new(frequencies.len() as u64);
    for &frequency in &frequencies {
        let omega = 2.0 * std::f64::consts::PI * frequency;
        let matrix = block_matrix(system, mass, omega)?;
        let lu = sparse::linalg::solvers::Lu::try_new_with_symbolic(
            symbolic.clone(),
            matrix.as_ref(),
        )
        .map_err(|err| {
            GroundwaveError::Solver(format!(
                "Error: sparse LU failed at {} Hz: {:?}\n",
                frequency, err
            ))
        })?;

        let mut rhs = stacked_force(system);
        lu.solve_in_place(rhs.as_mut());

        for (i, &node) in surface.iter().enumerate() {
            let [radial, vertical] = map.dofs[node];
            let (re_r, im_r) = read_complex(&rhs, radial, n);
            let (re_z, im_z) = read_complex(&rhs, vertical, n);
            r_real[i].push(re_r);
            r_imag[i].push(im_r);
            z_real[i].push(re_z);
            z_imag[i].push(im_z);
        }
        bar.inc(1);
    }
    bar.finish();

    report.calculation_ended()?;

    Ok(TransferResult {
        frequency: frequencies,
        rcoord: surface.iter().map(|&node| mesh.nodes[node].r).collect(),
        r_disp_real: r_real,
        r_disp_imag: r_imag,
        z_disp_real: z_real,
        z_disp_imag: z_imag,
        max_freq_limited: (mesh.max_freq_limited != config.high_freq)
            .then_some(mesh.max_freq_limited),
    })
}

/// Real and imaginary displacement of one DOF from the stacked solution
fn read_complex(solution: &Col<f64>, dof: Dof, n: usize) -> (f64, f64) {
    match dof {
        Dof::Free(eq) => (solution[eq], solution[eq + n]),
        Dof::Fixed => (0.0, 0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesher::tests::{sand_layer, test_config};
    use crate::wave_speed::s_wave_velocity;
    use crate::{assembler, bookkeeping, mesher};
    use crate::datatypes::BoundaryMode;
    use crate::report::Report;

    fn harmonic_setup(
        layers: Vec<crate::datatypes::Layer>,
        bounds: BoundaryMode,
    ) -> (
        RunConfig,
        Mesh,
        EquationMap,
        GlobalSystem,
        CsrMatrix<f64>,
    ) {
        let mut config = test_config(layers);
        config.bounds = bounds;
        let mesh = mesher::run(&config).unwrap();
        let map = bookkeeping::mapping(&mesh, bounds);
        let system = assembler::assemble(&mesh, &map, &config).unwrap();
        let mass = assembler::consistent_mass(&mesh, &map, &config);
        (config, mesh, map, system, mass)
    }

    #[test]
    fn static_limit_matches_small_frequency_solve() {
        // at a vanishing frequency the response approaches the static
        // deflection under the unit load
        let (_, _, _, system, mass) = harmonic_setup(
            vec![sand_layer(0.0, 20.0)],
            BoundaryMode::FixedBottom,
        );

        let slow = solve_single(&system, &mass, 2.0 * std::f64::consts::PI * 1e-3).unwrap();
        let slower = solve_single(&system, &mass, 2.0 * std::f64::consts::PI * 1e-4).unwrap();

        let n = system.neq;
        let norm_slow: f64 = (0..n).map(|i| slow[i] * slow[i]).sum::<f64>().sqrt();
        let norm_slower: f64 = (0..n).map(|i| slower[i] * slower[i]).sum::<f64>().sqrt();
        assert!((norm_slow - norm_slower).abs() / norm_slower < 1e-3);
    }

    #[test]
    fn solution_satisfies_block_system() {
        let (_, _, _, system, mass) = harmonic_setup(
            vec![sand_layer(0.0, 20.0)],
            BoundaryMode::AbsorbingAll,
        );
        let omega = 2.0 * std::f64::consts::PI * 10.0;

        let solution = solve_single(&system, &mass, omega).unwrap();

        // residual check: A x - b ~ 0, accumulated straight from the
        // triplets since duplicates sum
        let n2 = 2 * system.neq;
        let mut residual = vec![0.0f64; n2];
        for triplet in block_triplets(&system, &mass, omega) {
            residual[triplet.row] += triplet.val * solution[triplet.col];
        }
        let force = stacked_force(&system);
        let scale: f64 = (0..n2).map(|i| force[i].abs()).fold(0.0, f64::max);
        for i in 0..n2 {
            assert!((residual[i] - force[i]).abs() <= 1e-8 * scale.max(1.0));
        }
    }

    #[test]
    fn soft_layer_resonates_near_quarter_wavelength() {
        // a single layer on a rigid base amplifies vertical motion near
        // f = Vp / 4h; with the P-wave controlling the vertical column
        // resonance the peak of the sweep must sit in that neighborhood
        let layer = sand_layer(0.0, 10.0);
        let vs = s_wave_velocity(layer.youngs_modulus, layer.poisson_ratio, layer.density);
        let mut config = test_config(vec![layer]);
        config.bounds = BoundaryMode::FixedBottom;
        config.max_calc_depth = 10.0;
        let mesh = mesher::run(&config).unwrap();
        let map = bookkeeping::mapping(&mesh, config.bounds);
        let system = assembler::assemble(&mesh, &map, &config).unwrap();
        let mass = assembler::consistent_mass(&mesh, &map, &config);

        let report = Report::discard();
        let result = solve(&mesh, &map, &system, &mass, &config, &report).unwrap();

        // vertical response magnitude at the loaded center node
        let magnitudes: Vec<f64> = result.z_disp_real[0]
            .iter()
            .zip(&result.z_disp_imag[0])
            .map(|(re, im)| (re * re + im * im).sqrt())
            .collect();
        let peak = magnitudes
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .unwrap()
            .0;
        let peak_freq = result.frequency[peak];

        // the S-wave quarter-wavelength frequency bounds the peak from
        // below and the P-wave one caps it well inside the band
        let f_s = vs / (4.0 * 10.0);
        assert!(
            peak_freq > f_s * 0.8 && peak_freq < config.high_freq,
            "peak at {} Hz, S-wave column frequency {} Hz",
            peak_freq,
            f_s
        );
    }
}
