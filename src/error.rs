use std::fmt::Display;

#[derive(Debug)]
pub enum GroundwaveError {
    /// The input file could not be opened or parsed as JSON
    Input(String),
    /// A required key is missing from the run configuration
    MissingKey(String),
    /// The per-layer arrays do not all have the same length
    LayerMismatch(String),
    /// The output or report file could not be written
    Output(String),
    /// One or more configuration values are out of range
    Validation(String),
    /// A linear solve failed inside one of the solvers
    Solver(String),
}

impl GroundwaveError {
    /// Process exit code reported for this error kind
    pub fn exit_code(&self) -> i32 {
        match self {
            GroundwaveError::Input(_) => -101,
            GroundwaveError::MissingKey(_) => -102,
            GroundwaveError::LayerMismatch(_) => -103,
            GroundwaveError::Output(_) => -104,
            GroundwaveError::Validation(_) => -110,
            GroundwaveError::Solver(_) => -120,
        }
    }
}

impl Display for GroundwaveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (err_name, value) = match self {
            GroundwaveError::Input(v) => ("Input", v),
            GroundwaveError::MissingKey(v) => ("Missing key", v),
            GroundwaveError::LayerMismatch(v) => ("Layer mismatch", v),
            GroundwaveError::Output(v) => ("Output", v),
            GroundwaveError::Validation(v) => ("Validation", v),
            GroundwaveError::Solver(v) => ("Solver", v),
        };

        write!(f, "{} error: {}", err_name, value)
    }
}
