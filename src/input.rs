use serde_json::Value;

use crate::{
    datatypes::{BoundaryMode, CalcMethod, Layer, RunConfig},
    error::GroundwaveError,
};

/// Reads and validates the run configuration from a JSON file
///
/// Defaults for the optional keys are applied here, once, so the rest of
/// the program only ever sees a fully populated `RunConfig`.
///
/// # Arguments
/// * `input_file` - The path to the input JSON file
///
/// # Returns
/// The validated, immutable run configuration
pub fn read_config(input_file: &str) -> Result<RunConfig, GroundwaveError> {
    let contents = match std::fs::read_to_string(input_file) {
        Ok(c) => c,
        Err(err) => {
            return Err(GroundwaveError::Input(format!(
                "Unable to open input file {}: {}",
                input_file, err
            )))
        }
    };

    let root: Value = match serde_json::from_str(&contents) {
        Ok(v) => v,
        Err(err) => {
            return Err(GroundwaveError::Input(format!(
                "Input file {} is not valid JSON: {}",
                input_file, err
            )))
        }
    };

    parse_config(&root)
}

/// Builds a `RunConfig` out of a parsed JSON document
pub fn parse_config(root: &Value) -> Result<RunConfig, GroundwaveError> {
    for key in [
        "MaxCalcDist",
        "MaxCalcDepth",
        "MinLayerThickness",
        "LowFreq",
        "HighFreq",
        "CalcType",
        "Ground",
    ] {
        if root.get(key).is_none() {
            return Err(GroundwaveError::MissingKey(format!(
                "required key {} not found in input",
                key
            )));
        }
    }

    let ground = &root["Ground"];
    for key in ["Depth", "E", "damping", "rho", "v"] {
        if ground.get(key).is_none() {
            return Err(GroundwaveError::MissingKey(format!(
                "required key Ground.{} not found in input",
                key
            )));
        }
    }

    let depth = float_array(ground, "Depth")?;
    let e = float_array(ground, "E")?;
    let damping = float_array(ground, "damping")?;
    let rho = float_array(ground, "rho")?;
    let nu = float_array(ground, "v")?;
    let lithology = string_array(ground, "Lithology").unwrap_or_default();

    for (name, array) in [("E", &e), ("damping", &damping), ("rho", &rho), ("v", &nu)] {
        if array.len() != depth.len() {
            return Err(GroundwaveError::LayerMismatch(format!(
                "Ground.{} has {} entries, Ground.Depth has {}",
                name,
                array.len(),
                depth.len()
            )));
        }
    }

    let max_calc_depth = required_f64(root, "MaxCalcDepth")?;
    let min_layer_thickness = required_f64(root, "MinLayerThickness")?;

    // Layers below the calculation depth do not influence the result
    let mut layers: Vec<Layer> = Vec::new();
    for i in 0..depth.len() {
        if depth[i].abs() >= max_calc_depth {
            continue;
        }
        layers.push(Layer {
            depth: depth[i],
            thickness: 0.0,
            youngs_modulus: e[i],
            poisson_ratio: nu[i],
            density: rho[i],
            damping: damping[i],
            lithology: lithology.get(i).cloned().unwrap_or_default(),
        });
    }

    if layers.is_empty() {
        return Err(GroundwaveError::Validation(
            "Error: no soil layers remain above MaxCalcDepth\n".to_owned(),
        ));
    }

    // Derive thicknesses; the last layer stands in for the half-space
    // remainder and is extended to at least the minimum thickness
    for i in 0..layers.len() - 1 {
        layers[i].thickness = (layers[i + 1].depth - layers[i].depth).abs();
    }
    let last = layers.len() - 1;
    layers[last].thickness =
        (max_calc_depth - layers[last].depth.abs()).max(min_layer_thickness);

    let calc_code = required_i64(root, "CalcType")?;
    let bounds_code = optional_i64(root, "Bounds", 3);

    let config = RunConfig {
        name: root
            .get("Name")
            .and_then(Value::as_str)
            .unwrap_or("unnamed")
            .to_owned(),
        layers,
        max_calc_dist: required_f64(root, "MaxCalcDist")?,
        max_calc_depth,
        min_layer_thickness,
        min_element_size: optional_f64(root, "MinElementSize", 0.0),
        low_freq: required_f64(root, "LowFreq")?,
        high_freq: required_f64(root, "HighFreq")?,
        calc_method: CalcMethod::from_code(calc_code).ok_or_else(|| {
            GroundwaveError::Validation(format!(
                "Error: CalcType = {}. It should be 1, 2 or 3\n",
                calc_code
            ))
        })?,
        solver_type: optional_i64(root, "SolverType", 3),
        bounds: BoundaryMode::from_code(bounds_code).ok_or_else(|| {
            GroundwaveError::Validation(format!(
                "Error: Bounds = {}. It should be 0, 1, 2 or 3\n",
                bounds_code
            ))
        })?,
        time_increment_factor: optional_f64(root, "TimeIncrementFactor", 0.6),
        time_increment_max_iterations: optional_i64(root, "TimeIncrementMaxIterations", 1000)
            .max(0) as usize,
        time_increment_tolerance: optional_f64(root, "TimeIncrementTolerance", 1e-5),
        time_end_factor: optional_f64(root, "TimeEndFactor", 2.0),
        force_radius: optional_f64(root, "ForceRadius", 1.0),
        method_decision_factor: optional_f64(root, "MethodDecisionFactor", 1.0),
        max_element_ratio: optional_f64(root, "MaxElementRatio", 3.0),
        elements_per_wave: optional_f64(root, "ElementsPerWave", 10.0),
        freq_increment_factor: optional_f64(root, "FreqIncrementFactor", 1.0),
        forcing_freq_increment: optional_f64(root, "ForcingFreqIncrement", 1e-2),
        consistent_inf_stiffness: optional_bool(root, "ConsistentInfStiffness", true),
        consistent_inf_damping: optional_bool(root, "ConsistentInfDamping", true),
        bench_time_steps: optional_i64(root, "BenchTimeSteps", 10).max(1) as usize,
        bench_frequencies: optional_i64(root, "BenchFrequencies", 1).max(1) as usize,
    };

    validate_config(&config)?;

    Ok(config)
}

/// Checks every configuration value against its documented range
///
/// All violations are collected into a single message so the report file
/// lists the complete catalog, not just the first offender.
fn validate_config(config: &RunConfig) -> Result<(), GroundwaveError> {
    let mut errors = String::new();

    for (i, layer) in config.layers.iter().enumerate() {
        if !(1e5..=1e12).contains(&layer.youngs_modulus) {
            errors += &format!(
                "Error: Layer({}).E = {}. It should be between [1E5, 1E12]\n",
                i + 1,
                layer.youngs_modulus
            );
        }
        if layer.poisson_ratio <= -1.0 || layer.poisson_ratio >= 0.5 {
            errors += &format!(
                "Error: Layer({}).v = {}. It should be between <-1, 0.5>\n",
                i + 1,
                layer.poisson_ratio
            );
        }
        if !(500.0..=4000.0).contains(&layer.density) {
            errors += &format!(
                "Error: Layer({}).rho = {}. It should be between [500, 4000]\n",
                i + 1,
                layer.density
            );
        }
        if !(0.0..=0.99).contains(&layer.damping) {
            errors += &format!(
                "Error: Layer({}).damping = {}. It should be between [0, 0.99]\n",
                i + 1,
                layer.damping
            );
        }
    }

    if !(0.5..=300.0).contains(&config.max_calc_dist) {
        errors += &format!(
            "Error: MaxCalcDist = {}. It should be [0.5, 300]\n",
            config.max_calc_dist
        );
    }
    if !(0.5..=50.0).contains(&config.max_calc_depth) {
        errors += &format!(
            "Error: MaxCalcDepth = {}. It should be [0.5, 50]\n",
            config.max_calc_depth
        );
    }
    if !(0.3..=3.0).contains(&config.min_layer_thickness) {
        errors += &format!(
            "Error: MinLayerThickness = {}. It should be [0.3, 3]\n",
            config.min_layer_thickness
        );
    }
    if config.low_freq <= 0.0 {
        errors += &format!(
            "Error: LowFreq = {}. It should be <0, Inf]\n",
            config.low_freq
        );
    }
    if config.high_freq <= 0.0 || config.high_freq > 150.0 {
        errors += &format!(
            "Error: HighFreq = {}. It should be <0, 150]\n",
            config.high_freq
        );
    }
    if config.high_freq < config.low_freq {
        errors += &format!(
            "Error: HighFreq = {} < LowFreq = {}\n",
            config.high_freq, config.low_freq
        );
    }
    if !(1..=3).contains(&config.solver_type) {
        errors += &format!(
            "Error: SolverType = {}. It should be 1, 2 or 3\n",
            config.solver_type
        );
    }
    if config.time_increment_factor <= 0.0 || config.time_increment_factor > 1.0 {
        errors += &format!(
            "Error: TimeIncrementFactor = {}. It should be <0, 1]\n",
            config.time_increment_factor
        );
    }
    if config.time_increment_max_iterations <= 1 {
        errors += &format!(
            "Error: TimeIncrementMaxIterations = {}. It should be <1, Inf>\n",
            config.time_increment_max_iterations
        );
    }
    if config.time_increment_tolerance <= 0.0 || config.time_increment_tolerance >= 1.0 {
        errors += &format!(
            "Error: TimeIncrementTolerance = {}. It should be <0, 1>\n",
            config.time_increment_tolerance
        );
    }
    if config.time_end_factor < 1.0 {
        errors += &format!(
            "Error: TimeEndFactor = {}. It should be [1, Inf>\n",
            config.time_end_factor
        );
    }
    if config.force_radius < 0.5 {
        errors += &format!(
            "Error: ForceRadius = {}. It should be [0.5, Inf>\n",
            config.force_radius
        );
    }
    if config.method_decision_factor <= 0.0 || config.method_decision_factor > 1.0 {
        errors += &format!(
            "Error: MethodDecisionFactor = {}. It should be <0, 1]\n",
            config.method_decision_factor
        );
    }
    if !(1.0..=10.0).contains(&config.max_element_ratio) {
        errors += &format!(
            "Error: MaxElementRatio = {}. It should be [1, 10]\n",
            config.max_element_ratio
        );
    }
    if !(1.0..=20.0).contains(&config.elements_per_wave) {
        errors += &format!(
            "Error: ElementsPerWave = {}. It should be [1, 20]\n",
            config.elements_per_wave
        );
    }
    if !(0.5..=10.0).contains(&config.freq_increment_factor) {
        errors += &format!(
            "Error: FreqIncrementFactor = {}. It should be [0.5, 10]\n",
            config.freq_increment_factor
        );
    }
    if !(1e-3..=2.0).contains(&config.forcing_freq_increment) {
        errors += &format!(
            "Error: ForcingFreqIncrement = {}. It should be [1.0E-3, 2]\n",
            config.forcing_freq_increment
        );
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(GroundwaveError::Validation(errors))
    }
}

fn required_f64(value: &Value, key: &str) -> Result<f64, GroundwaveError> {
    value
        .get(key)
        .and_then(Value::as_f64)
        .ok_or_else(|| GroundwaveError::MissingKey(format!("key {} is not a number", key)))
}

fn required_i64(value: &Value, key: &str) -> Result<i64, GroundwaveError> {
    value
        .get(key)
        .and_then(Value::as_i64)
        .ok_or_else(|| GroundwaveError::MissingKey(format!("key {} is not an integer", key)))
}

fn optional_f64(value: &Value, key: &str, default: f64) -> f64 {
    value.get(key).and_then(Value::as_f64).unwrap_or(default)
}

fn optional_i64(value: &Value, key: &str, default: i64) -> i64 {
    value.get(key).and_then(Value::as_i64).unwrap_or(default)
}

fn optional_bool(value: &Value, key: &str, default: bool) -> bool {
    value.get(key).and_then(Value::as_bool).unwrap_or(default)
}

fn float_array(value: &Value, key: &str) -> Result<Vec<f64>, GroundwaveError> {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(|array| {
            array
                .iter()
                .map(|v| {
                    v.as_f64().ok_or_else(|| {
                        GroundwaveError::Input(format!("non-numeric entry in Ground.{}", key))
                    })
                })
                .collect::<Result<Vec<f64>, GroundwaveError>>()
        })
        .ok_or_else(|| {
            GroundwaveError::MissingKey(format!("key Ground.{} is not an array", key))
        })?
}

fn string_array(value: &Value, key: &str) -> Option<Vec<String>> {
    value.get(key).and_then(Value::as_array).map(|array| {
        array
            .iter()
            .map(|v| v.as_str().unwrap_or_default().to_owned())
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn base_input() -> Value {
        json!({
            "Name": "unit test",
            "MaxCalcDist": 50.0,
            "MaxCalcDepth": 20.0,
            "MinLayerThickness": 1.0,
            "LowFreq": 1.0,
            "HighFreq": 20.0,
            "CalcType": 2,
            "Ground": {
                "Depth": [0.0, -5.0],
                "E": [5.0e7, 1.0e8],
                "Lithology": ["sand", "clay"],
                "damping": [0.05, 0.02],
                "rho": [1800.0, 2000.0],
                "v": [0.3, 0.35]
            }
        })
    }

    #[test]
    fn parses_valid_input_with_defaults() {
        let config = parse_config(&base_input()).unwrap();
        assert_eq!(config.layers.len(), 2);
        assert_eq!(config.solver_type, 3);
        assert!(config.bounds.side_absorbing());
        assert!(config.bounds.bottom_absorbing());
        assert_eq!(config.time_end_factor, 2.0);
        assert_eq!(config.force_radius, 1.0);
        assert_eq!(config.bench_time_steps, 10);
    }

    #[test]
    fn derives_layer_thicknesses() {
        let config = parse_config(&base_input()).unwrap();
        assert_eq!(config.layers[0].thickness, 5.0);
        // the last layer runs to the calculation depth
        assert_eq!(config.layers[1].thickness, 15.0);
    }

    #[test]
    fn extends_thin_bottom_layer() {
        let mut input = base_input();
        input["Ground"]["Depth"] = json!([0.0, -19.9]);
        let config = parse_config(&input).unwrap();
        assert_eq!(config.layers[1].thickness, 1.0);
    }

    #[test]
    fn drops_layers_below_max_depth() {
        let mut input = base_input();
        input["Ground"]["Depth"] = json!([0.0, -30.0]);
        let config = parse_config(&input).unwrap();
        assert_eq!(config.layers.len(), 1);
    }

    #[test]
    fn missing_key_is_reported() {
        let mut input = base_input();
        input.as_object_mut().unwrap().remove("HighFreq");
        let err = parse_config(&input).unwrap_err();
        assert_eq!(err.exit_code(), -102);
    }

    #[test]
    fn mismatched_layer_arrays_are_rejected() {
        let mut input = base_input();
        input["Ground"]["rho"] = json!([1800.0]);
        let err = parse_config(&input).unwrap_err();
        assert_eq!(err.exit_code(), -103);
    }

    #[test]
    fn invalid_poisson_ratio_is_fatal() {
        let mut input = base_input();
        input["Ground"]["v"] = json!([0.3, 0.5]);
        let err = parse_config(&input).unwrap_err();
        assert_eq!(err.exit_code(), -110);
        assert!(format!("{}", err).contains("Layer(2).v"));
    }

    #[test]
    fn out_of_range_values_are_catalogued_together() {
        let mut input = base_input();
        input["MaxCalcDist"] = json!(500.0);
        input["HighFreq"] = json!(200.0);
        let err = parse_config(&input).unwrap_err();
        let message = format!("{}", err);
        assert!(message.contains("MaxCalcDist"));
        assert!(message.contains("HighFreq"));
    }
}
