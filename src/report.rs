//! Run report and result output.
//!
//! The report file is an append-only audit trail of one run: the input
//! that was read, the discretized model, the method decision and the
//! calculation markers with timestamps. The result itself goes to a
//! separate JSON file.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use crate::{
    datatypes::{CalcMethod, EquationMap, Mesh, RunConfig, TransferResult},
    error::GroundwaveError,
    solver::TimeSampling,
};

/// Append-only audit trail of a run
pub struct Report {
    path: Option<PathBuf>,
}

impl Report {
    pub fn new(path: &str) -> Report {
        Report {
            path: Some(PathBuf::from(path)),
        }
    }

    /// A report that writes nowhere, for probing and tests
    pub fn discard() -> Report {
        Report { path: None }
    }

    fn timestamp() -> String {
        chrono::Local::now().format("%B %d, %Y %I:%M:%S").to_string()
    }

    fn append(&self, text: &str) -> Result<(), GroundwaveError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|err| {
                GroundwaveError::Output(format!(
                    "Error: could not open report file {}: {}\n",
                    path.display(),
                    err
                ))
            })?;
        file.write_all(text.as_bytes()).map_err(|err| {
            GroundwaveError::Output(format!(
                "Error: could not write report file {}: {}\n",
                path.display(),
                err
            ))
        })
    }

    /// Records that the input file was read and validated
    pub fn input_read(&self, input_path: &str) -> Result<(), GroundwaveError> {
        self.append(&format!(
            "----------------------------------------------------------------\n\
             Reading input started at {}\n  Input file: {}\n\
             Reading input ended at {}\n\
             ----------------------------------------------------------------\n\n",
            Report::timestamp(),
            input_path,
            Report::timestamp()
        ))
    }

    /// Writes the discretized model: parameters, layer table, node and
    /// element coordinates
    ///
    /// Node and element indices are 1-based in the tables, matching how
    /// engineers count them when cross-checking a mesh by hand.
    pub fn model_info(
        &self,
        config: &RunConfig,
        mesh: &Mesh,
        map: &EquationMap,
        method: CalcMethod,
    ) -> Result<(), GroundwaveError> {
        let mut text = String::new();
        text.push_str(&format!("project name         = {}\n", config.name));
        text.push_str(&format!("min. freq            = {:>12} Hz\n", config.low_freq));
        text.push_str(&format!("max. freq            = {:>12} Hz\n", config.high_freq));
        if mesh.max_freq_limited != config.high_freq {
            text.push_str(&format!(
                "max. freq limited to = {:>12.5} Hz\n",
                mesh.max_freq_limited
            ));
        }
        text.push_str(&format!(
            "max. distance        = {:>12} m\n",
            config.max_calc_dist
        ));
        text.push_str(&format!(
            "min. layer thickness = {:>12} m\n",
            config.min_layer_thickness
        ));
        text.push_str(&format!("calculation type     = {:>12}\n", method.label()));
        if method == CalcMethod::Harmonic {
            text.push_str(&format!("solver type          = {:>12}\n", "sparse LU"));
        }
        text.push_str(&format!("number of equations  = {:>12}\n", map.neq));

        text.push_str(
            "\n       layer       E [Pa]       nu [-]  Rho [kg/m3]  damping [-]   height [m] \
             el. size [m]    el. num X    el. num Y\n",
        );
        text.push_str(&"-".repeat(116));
        text.push('\n');
        for (i, layer) in config.layers.iter().enumerate() {
            text.push_str(&format!(
                "{:>12} {:>12.6e} {:>12.6e} {:>12.6e} {:>12.6e} {:>12.6e} {:>12.6e} {:>12} {:>12}\n",
                i + 1,
                layer.youngs_modulus,
                layer.poisson_ratio,
                layer.density,
                layer.damping,
                layer.thickness,
                mesh.elem_size[i],
                mesh.elem_count[i][0],
                mesh.elem_count[i][1]
            ));
        }

        text.push_str("\n        node        R [m]        Z [m]\n");
        text.push_str(&"-".repeat(38));
        text.push('\n');
        for (i, node) in mesh.nodes.iter().enumerate() {
            text.push_str(&format!("{:>12} {:>12.6e} {:>12.6e}\n", i + 1, node.r, node.z));
        }

        text.push_str("\n     element        node1        node2        node3        node4\n");
        text.push_str(&"-".repeat(64));
        text.push('\n');
        for (i, element) in mesh.elements.iter().enumerate() {
            text.push_str(&format!(
                "{:>12} {:>12} {:>12} {:>12} {:>12}\n",
                i + 1,
                element.nodes[0] + 1,
                element.nodes[1] + 1,
                element.nodes[2] + 1,
                element.nodes[3] + 1
            ));
        }

        self.append(&text)
    }

    /// Records the timing probe and the resulting method choice
    pub fn method_decision(
        &self,
        explicit_time: f64,
        harmonic_time: f64,
        factor: f64,
        chosen: CalcMethod,
    ) -> Result<(), GroundwaveError> {
        let mut text = format!(
            "----------------------------------------------------------------\n\n\
             CPU time estimation finished at {}\n\
             \x20   estimated CPU time for explicit {:>12.6e}\n\
             \x20   estimated CPU time for harmonic {:>12.6e}\n",
            Report::timestamp(),
            explicit_time,
            harmonic_time
        );
        match chosen {
            CalcMethod::Explicit => {
                text.push_str(&format!(
                    "        Texplicit < {:>12.6e} x Tharmonic\n\
                     \x20              explicit time integration is chosen\n",
                    factor
                ));
            }
            _ => {
                text.push_str(&format!(
                    "       Texplicit >= {:>12.6e} x Tharmonic\n\
                     \x20             harmonic response analysis is chosen\n",
                    factor
                ));
            }
        }
        self.append(&text)
    }

    /// Marks the start of the explicit integration with its discretization
    pub fn explicit_started(&self, sampling: &TimeSampling) -> Result<(), GroundwaveError> {
        self.append(&format!(
            "----------------------------------------------------------------\n\n\
             Calculation started at {}\n\
             \x20   total simulation time of {:>12.6e}\n\
             \x20        with a time step of {:>12.6e}\n\
             \x20   total number of time steps {}\n",
            Report::timestamp(),
            sampling.time_end,
            sampling.time_step,
            sampling.total_steps
        ))
    }

    /// Marks the start of the harmonic sweep
    pub fn harmonic_started(&self, total_frequencies: usize) -> Result<(), GroundwaveError> {
        self.append(&format!(
            "----------------------------------------------------------------\n\n\
             Calculation started at {}\n\
             \x20total number of frequency steps {}\n",
            Report::timestamp(),
            total_frequencies
        ))
    }

    pub fn calculation_ended(&self) -> Result<(), GroundwaveError> {
        self.append(&format!("Calculation ended at {}\n", Report::timestamp()))
    }

    /// Records the validation catalog of a rejected input
    pub fn validation_errors(&self, message: &str) -> Result<(), GroundwaveError> {
        self.append(&format!(
            "\n---------------------------\n\
             \x20 I N P U T   E R R O R S  \n\
             ---------------------------\n{}",
            message
        ))
    }
}

/// Writes the transfer compliance result as pretty-printed JSON
pub fn write_output(path: &str, result: &TransferResult) -> Result<(), GroundwaveError> {
    let json = serde_json::to_string_pretty(result).map_err(|err| {
        GroundwaveError::Output(format!(
            "Error: could not serialize results: {}\n",
            err
        ))
    })?;
    std::fs::write(path, json).map_err(|err| {
        GroundwaveError::Output(format!(
            "Error: could not write output file {}: {}\n",
            path, err
        ))
    })
}
