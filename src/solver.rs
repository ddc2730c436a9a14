//! Solution method selection and the sampling rules shared by both
//! solvers.
//!
//! The explicit time integration and the harmonic response analysis
//! compute the same surface transfer compliance; which one is cheaper
//! depends on the mesh and the frequency band. The auto selector times a
//! small probe of each and extrapolates to the full run.

use nalgebra::DVector;
use nalgebra_sparse::csr::CsrMatrix;
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::{
    assembler::{self, GlobalSystem},
    datatypes::{CalcMethod, EquationMap, Mesh, RunConfig, TransferResult},
    error::GroundwaveError,
    explicit, harmonic,
    report::Report,
    wave_speed::s_wave_velocity,
};

/// Seed for the broadband forcing phases and the power iteration start
pub const RNG_SEED: u64 = 999;

/// Amplitude applied to the broadband forcing sum
pub const FORCE_AMPLITUDE: f64 = 1.0e6;

/// Time discretization of one explicit run
#[derive(Debug, Clone, Copy)]
pub struct TimeSampling {
    pub time_step: f64,
    pub total_steps: usize,
    pub output_interval: usize,
    pub time_end: f64,
}

/// Solves the model with the configured method and returns the surface
/// transfer compliance
///
/// With the auto method both mass matrices are assembled up front, the
/// probe timing decides, and the chosen solver reuses the mass it needs.
pub fn run(
    mesh: &Mesh,
    map: &EquationMap,
    system: &GlobalSystem,
    config: &RunConfig,
    report: &Report,
) -> Result<TransferResult, GroundwaveError> {
    let mut lumped = None;
    let mut consistent = None;

    let method = match config.calc_method {
        CalcMethod::Auto => {
            let lumped_mass = assembler::lumped_mass(mesh, map, config);
            let consistent_mass = assembler::consistent_mass(mesh, map, config);
            let method = pick_method(system, &lumped_mass, &consistent_mass, config, report)?;
            lumped = Some(lumped_mass);
            consistent = Some(consistent_mass);
            method
        }
        method => method,
    };

    report.model_info(config, mesh, map, method)?;

    match method {
        CalcMethod::Explicit => {
            let lumped_mass =
                lumped.unwrap_or_else(|| assembler::lumped_mass(mesh, map, config));
            explicit::solve(mesh, map, system, &lumped_mass, config, report)
        }
        CalcMethod::Harmonic => {
            let consistent_mass =
                consistent.unwrap_or_else(|| assembler::consistent_mass(mesh, map, config));
            harmonic::solve(mesh, map, system, &consistent_mass, config, report)
        }
        CalcMethod::Auto => unreachable!("auto resolves to a concrete method above"),
    }
}

/// Determines the time discretization of the explicit solver
///
/// The step is the critical central difference step scaled by the safety
/// factor; the simulated span covers the travel time of an S-wave through
/// the slowest layer over the full calculation distance. The number of
/// recorded samples is rounded up to a power of two for the spectral
/// post-processing, stretching the simulated span accordingly.
pub fn time_sampling(
    config: &RunConfig,
    stiffness: &CsrMatrix<f64>,
    lumped_mass: &DVector<f64>,
) -> Result<TimeSampling, GroundwaveError> {
    let time_step = max_time_step(
        stiffness,
        lumped_mass,
        config.time_increment_factor,
        config.time_increment_tolerance,
        config.time_increment_max_iterations,
    )?;

    let vs_min = config
        .layers
        .iter()
        .map(|l| s_wave_velocity(l.youngs_modulus, l.poisson_ratio, l.density))
        .fold(f64::INFINITY, f64::min);
    let time_end = config.time_end_factor * config.max_calc_dist / vs_min;

    let total_steps = (time_end / time_step).round().max(1.0) as usize;
    let output_interval =
        ((1.0 / config.high_freq / time_step / 4.0).round().max(1.0)) as usize;

    let output_number = (total_steps / output_interval).max(2);
    let output_number = 1usize << (output_number as f64).log2().ceil() as usize;
    let total_steps = output_number * output_interval;

    Ok(TimeSampling {
        time_step,
        total_steps,
        output_interval,
        time_end,
    })
}

/// Estimates the critical explicit time step with the power method
///
/// Iterates `x <- M^-1 K x` until the Rayleigh estimate of the largest
/// eigenvalue settles; if the tolerance is not reached the last iterate is
/// used, which errs on the safe side with the configured safety factor.
///
/// # Arguments
/// * `stiffness` - Global stiffness matrix
/// * `lumped_mass` - Diagonal of the lumped mass matrix
/// * `factor` - Safety factor on the critical step
/// * `tolerance` - Relative convergence tolerance for the eigenvalue
/// * `max_iterations` - Iteration cap for the power method
pub fn max_time_step(
    stiffness: &CsrMatrix<f64>,
    lumped_mass: &DVector<f64>,
    factor: f64,
    tolerance: f64,
    max_iterations: usize,
) -> Result<f64, GroundwaveError> {
    let neq = lumped_mass.len();
    let inv_mass = lumped_mass.map(|m| 1.0 / m);

    let mut rng = StdRng::seed_from_u64(RNG_SEED);
    let mut x: DVector<f64> = DVector::from_fn(neq, |_, _| rng.gen::<f64>());

    let mut eigenvalue = 0.0f64;
    for _ in 0..max_iterations {
        let normalized = &x / x.norm();
        x = (stiffness * &normalized).component_mul(&inv_mass);
        let next = x.dot(&normalized);
        if next <= 0.0 || !next.is_finite() {
            return Err(GroundwaveError::Solver(format!(
                "Error: power iteration produced eigenvalue estimate {}\n",
                next
            )));
        }
        let converged = ((next - eigenvalue) / next).abs() <= tolerance;
        eigenvalue = next;
        if converged {
            break;
        }
    }

    Ok(factor * 2.0 / eigenvalue.sqrt())
}

/// Determines the frequencies for the harmonic response analysis
///
/// Frequencies are spaced logarithmically, dense enough that a resonance
/// with the mean damping of the profile is hit by at least one sample; the
/// increment factor scales the count up for finer sweeps.
pub fn frequency_sampling(config: &RunConfig) -> Vec<f64> {
    let mean_damping = config.layers.iter().map(|l| l.damping).sum::<f64>()
        / config.layers.len() as f64;
    let eta = mean_damping.max(0.1) * 2.0;

    let per_decade = (config.high_freq / config.low_freq).ln() / (1.0 + eta / 2.0).ln();
    let count = (config.freq_increment_factor * (per_decade.ceil() + 1.0)) as usize;
    let count = count.max(2);

    let log_low = config.low_freq.log10();
    let log_high = config.high_freq.log10();
    (0..count)
        .map(|i| {
            let fraction = i as f64 / (count - 1) as f64;
            10f64.powf(log_low + fraction * (log_high - log_low))
        })
        .collect()
}

/// Angular frequencies and phases of the broadband forcing terms
///
/// The sum of sines covers the band up to 10% above the highest frequency
/// of interest; phases come from a fixed-seed generator so repeated runs
/// excite the model identically.
pub fn forcing_terms(config: &RunConfig) -> Vec<(f64, f64)> {
    let mut rng = StdRng::seed_from_u64(RNG_SEED);
    let limit = config.high_freq * 1.1;

    let mut terms = Vec::new();
    let mut frequency = config.forcing_freq_increment;
    while frequency < limit {
        let phase = rng.gen::<f64>() * 2.0 * std::f64::consts::PI;
        terms.push((frequency * 2.0 * std::f64::consts::PI, phase));
        frequency += config.forcing_freq_increment;
    }

    terms
}

/// Evaluates the broadband forcing magnitude at one instant
pub fn forcing_amplitude(terms: &[(f64, f64)], time: f64) -> f64 {
    FORCE_AMPLITUDE
        * terms
            .iter()
            .map(|(omega, phase)| (omega * time + phase).sin())
            .sum::<f64>()
}

/// Picks the cheaper solution method from probe timings
///
/// A handful of explicit steps and one harmonic factorization are timed
/// and extrapolated to the full run; explicit integration wins when its
/// projected time stays under the harmonic projection times the decision
/// factor.
pub fn pick_method(
    system: &GlobalSystem,
    lumped_mass: &DVector<f64>,
    consistent_mass: &CsrMatrix<f64>,
    config: &RunConfig,
    report: &Report,
) -> Result<CalcMethod, GroundwaveError> {
    let sampling = time_sampling(config, &system.stiffness, lumped_mass)?;
    let frequencies = frequency_sampling(config);

    println!("info: probing both solution methods...");

    // probe the explicit update on throwaway state
    let terms = forcing_terms(config);
    let inv_mass = lumped_mass.map(|m| 1.0 / m);
    let mut disp = DVector::from_element(system.neq, 1.0);
    let mut vel = DVector::from_element(system.neq, 1.0);

    let start = std::time::Instant::now();
    let mut time = sampling.time_step;
    for _ in 0..config.bench_time_steps {
        let magnitude = forcing_amplitude(&terms, time);
        let acc = explicit::acceleration(system, &inv_mass, &disp, &vel, magnitude);
        vel += &acc * sampling.time_step;
        disp += &vel * sampling.time_step;
        time += sampling.time_step;
    }
    let explicit_time = start.elapsed().as_secs_f64() * sampling.total_steps as f64
        / config.bench_time_steps as f64;

    // probe the harmonic solve at the stiffest frequency of the sweep
    let probe_omega = frequencies.last().expect("sampling yields frequencies")
        * 2.0
        * std::f64::consts::PI;
    let start = std::time::Instant::now();
    for _ in 0..config.bench_frequencies {
        harmonic::solve_single(system, consistent_mass, probe_omega)?;
    }
    let harmonic_time = start.elapsed().as_secs_f64() * frequencies.len() as f64
        / config.bench_frequencies as f64;

    let method = if explicit_time < harmonic_time * config.method_decision_factor {
        CalcMethod::Explicit
    } else {
        CalcMethod::Harmonic
    };

    println!(
        "info: projected {:.3} s explicit vs {:.3} s harmonic, using {}",
        explicit_time,
        harmonic_time,
        method.label()
    );
    report.method_decision(
        explicit_time,
        harmonic_time,
        config.method_decision_factor,
        method,
    )?;

    Ok(method)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bookkeeping;
    use crate::datatypes::BoundaryMode;
    use crate::mesher;
    use crate::mesher::tests::{sand_layer, test_config};
    use approx::assert_relative_eq;

    fn explicit_setup() -> (RunConfig, CsrMatrix<f64>, DVector<f64>) {
        let config = test_config(vec![sand_layer(0.0, 20.0)]);
        let mesh = mesher::run(&config).unwrap();
        let map = bookkeeping::mapping(&mesh, BoundaryMode::AbsorbingAll);
        let system = assembler::assemble(&mesh, &map, &config).unwrap();
        let lumped = assembler::lumped_mass(&mesh, &map, &config);
        (config, system.stiffness, lumped)
    }

    #[test]
    fn frequency_sweep_spans_configured_band() {
        let config = test_config(vec![sand_layer(0.0, 20.0)]);
        let frequencies = frequency_sampling(&config);

        assert!(frequencies.len() >= 2);
        assert_relative_eq!(frequencies[0], config.low_freq, max_relative = 1e-12);
        assert_relative_eq!(
            *frequencies.last().unwrap(),
            config.high_freq,
            max_relative = 1e-12
        );
        for pair in frequencies.windows(2) {
            assert!(pair[1] > pair[0]);
        }
    }

    #[test]
    fn frequency_sweep_is_log_spaced() {
        let config = test_config(vec![sand_layer(0.0, 20.0)]);
        let frequencies = frequency_sampling(&config);

        let ratio = frequencies[1] / frequencies[0];
        for pair in frequencies.windows(2) {
            assert_relative_eq!(pair[1] / pair[0], ratio, max_relative = 1e-9);
        }
    }

    #[test]
    fn increment_factor_densifies_the_sweep() {
        let config = test_config(vec![sand_layer(0.0, 20.0)]);
        let mut dense_config = config.clone();
        dense_config.freq_increment_factor = 3.0;

        assert!(frequency_sampling(&dense_config).len() > frequency_sampling(&config).len());
    }

    #[test]
    fn forcing_covers_the_band_with_reproducible_phases() {
        let config = test_config(vec![sand_layer(0.0, 20.0)]);
        let terms = forcing_terms(&config);

        let max_omega = terms.iter().map(|t| t.0).fold(0.0, f64::max);
        assert!(max_omega / (2.0 * std::f64::consts::PI) <= config.high_freq * 1.1);
        assert!(max_omega / (2.0 * std::f64::consts::PI) > config.high_freq);

        // same seed, same phases
        assert_eq!(terms, forcing_terms(&config));
    }

    #[test]
    fn time_step_scales_with_wave_speed() {
        // stiffening the ground by 4x doubles the wave speed and halves
        // the stable step
        let (_, stiffness, lumped) = explicit_setup();
        let dt_soft = max_time_step(&stiffness, &lumped, 1.0, 1e-8, 5000).unwrap();

        let stiffer = CsrMatrix::from(&{
            let mut coo = nalgebra_sparse::coo::CooMatrix::new(stiffness.nrows(), stiffness.ncols());
            for (i, j, v) in stiffness.triplet_iter() {
                coo.push(i, j, 4.0 * v);
            }
            coo
        });
        let dt_stiff = max_time_step(&stiffer, &lumped, 1.0, 1e-8, 5000).unwrap();

        assert_relative_eq!(dt_soft / dt_stiff, 2.0, max_relative = 1e-6);
    }

    #[test]
    fn solvers_place_the_resonance_peak_together() {
        // two-layer low-damping column on a rigid base: both solution
        // methods must find the same compliance peak, within one sample
        // of the coarser frequency grid
        let mut upper = sand_layer(0.0, 2.0);
        upper.damping = 0.02;
        let mut lower = sand_layer(-2.0, 8.0);
        lower.youngs_modulus = 2.0e8;
        lower.damping = 0.02;
        let mut config = test_config(vec![upper, lower]);
        config.bounds = BoundaryMode::FixedBottom;
        config.max_calc_depth = 10.0;
        // a longer record sharpens the spectral resolution of the
        // explicit estimate, a denser sweep that of the harmonic one
        config.time_end_factor = 8.0;
        config.freq_increment_factor = 2.0;

        let mesh = mesher::run(&config).unwrap();
        let map = bookkeeping::mapping(&mesh, config.bounds);
        let system = assembler::assemble(&mesh, &map, &config).unwrap();
        let lumped = assembler::lumped_mass(&mesh, &map, &config);
        let consistent = assembler::consistent_mass(&mesh, &map, &config);

        let report = Report::discard();
        let explicit_result =
            explicit::solve(&mesh, &map, &system, &lumped, &config, &report).unwrap();
        let harmonic_result =
            harmonic::solve(&mesh, &map, &system, &consistent, &config, &report).unwrap();

        // vertical compliance peak at the loaded center node
        let peak_frequency = |result: &TransferResult| -> f64 {
            let idx = result.z_disp_real[0]
                .iter()
                .zip(&result.z_disp_imag[0])
                .map(|(re, im)| re * re + im * im)
                .enumerate()
                .max_by(|a, b| a.1.total_cmp(&b.1))
                .unwrap()
                .0;
            result.frequency[idx]
        };
        let f_explicit = peak_frequency(&explicit_result);
        let f_harmonic = peak_frequency(&harmonic_result);

        let df_explicit = explicit_result.frequency[1] - explicit_result.frequency[0];
        let df_harmonic = harmonic_result
            .frequency
            .windows(2)
            .map(|pair| pair[1] - pair[0])
            .fold(0.0, f64::max);
        assert!(
            (f_explicit - f_harmonic).abs() <= df_explicit.max(df_harmonic),
            "explicit peak {} Hz vs harmonic peak {} Hz",
            f_explicit,
            f_harmonic
        );
    }

    #[test]
    fn recorded_samples_are_a_power_of_two() {
        let (config, stiffness, lumped) = explicit_setup();
        let sampling = time_sampling(&config, &stiffness, &lumped).unwrap();

        assert_eq!(sampling.total_steps % sampling.output_interval, 0);
        let output_number = sampling.total_steps / sampling.output_interval;
        assert!(output_number.is_power_of_two());
        assert!(sampling.time_step > 0.0);
        assert!(sampling.total_steps as f64 * sampling.time_step >= sampling.time_end * 0.99);
    }
}
