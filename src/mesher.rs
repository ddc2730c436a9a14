use crate::{
    datatypes::{Element, Mesh, Node, RunConfig},
    error::GroundwaveError,
    wave_speed::s_wave_velocity,
};

/// Generates the axisymmetric soil mesh for a run configuration
///
/// # Arguments
/// * `config` - The validated run configuration
///
/// # Returns
/// The mesh, including the per-layer discretization summary and the
/// (possibly degraded) maximum resolvable frequency
pub fn run(config: &RunConfig) -> Result<Mesh, GroundwaveError> {
    let (elem_size, max_freq_limited) = element_size(config);
    let elem_count = elements_per_layer(config, &elem_size)?;
    let nodes = node_coordinates(config, &elem_count);
    let elements = element_nodes(&elem_count);

    println!(
        "info: meshed {} layers into {} nodes and {} elements",
        config.layers.len(),
        nodes.len(),
        elements.len()
    );

    Ok(Mesh {
        nodes,
        elements,
        elem_count,
        elem_size,
        max_freq_limited,
    })
}

/// Determines the maximum element size of each layer
///
/// The size is one S-wavelength at the highest frequency of interest
/// divided by the configured elements-per-wavelength. When a layer is too
/// soft to honor the minimum element size, the size is clamped and the
/// usable frequency range shrinks accordingly.
///
/// # Returns
/// The per-layer element sizes and the limited maximum frequency
fn element_size(config: &RunConfig) -> (Vec<f64>, f64) {
    let mut max_freq_limited = config.high_freq;
    let mut sizes = Vec::with_capacity(config.layers.len());

    for layer in &config.layers {
        let vs = s_wave_velocity(layer.youngs_modulus, layer.poisson_ratio, layer.density);
        let mut size = vs / config.elements_per_wave / config.high_freq;

        if size < config.min_element_size {
            max_freq_limited =
                max_freq_limited.min(config.high_freq * size / config.min_element_size);
            size = config.min_element_size;
        }

        sizes.push(size);
    }

    (sizes, max_freq_limited)
}

/// Determines the radial and vertical element counts of each layer
///
/// The radial step is uniform over all layers: it divides the calculation
/// distance evenly and never exceeds the smallest layer element size. The
/// vertical count per layer is then adjusted so the element aspect ratio
/// stays within `MaxElementRatio` in both directions.
fn elements_per_layer(
    config: &RunConfig,
    elem_size: &[f64],
) -> Result<Vec<[usize; 2]>, GroundwaveError> {
    let smallest = elem_size.iter().cloned().fold(f64::INFINITY, f64::min);
    if !smallest.is_finite() || smallest <= 0.0 {
        return Err(GroundwaveError::Validation(format!(
            "Error: computed element size {} is not usable\n",
            smallest
        )));
    }

    let radial_divisions = (config.max_calc_dist / smallest).ceil().max(1.0);
    let dr = config.max_calc_dist / radial_divisions;
    let n_radial = radial_divisions as usize;

    let ratio = config.max_element_ratio;
    let mut elem_count = Vec::with_capacity(config.layers.len());

    for (layer, &size) in config.layers.iter().zip(elem_size) {
        let thickness = layer.thickness;
        let n_wave = ((thickness / size).floor() as usize).max(1);

        // counts keeping dz within [dr/ratio, dr*ratio]; a layer too thin
        // to reach the lower bound keeps the height bound instead
        let n_min = ((thickness / (dr * ratio)).ceil() as usize).max(1);
        let n_max = ((thickness * ratio / dr).floor() as usize).max(n_min);

        elem_count.push([n_radial, n_wave.clamp(n_min, n_max)]);
    }

    Ok(elem_count)
}

/// Generates the full regular node grid, row-major per vertical level
fn node_coordinates(config: &RunConfig, elem_count: &[[usize; 2]]) -> Vec<Node> {
    let nodes_in_r = elem_count[0][0] + 1;
    let nodes_in_z: usize = elem_count.iter().map(|c| c[1]).sum::<usize>() + 1;

    let dr = config.max_calc_dist / elem_count[0][0] as f64;

    let mut z_levels = Vec::with_capacity(nodes_in_z);
    let mut z0 = 0.0;
    for (layer, count) in config.layers.iter().zip(elem_count) {
        let dz = layer.thickness / count[1] as f64;
        for i in 0..count[1] {
            z_levels.push(z0 - i as f64 * dz);
        }
        z0 -= layer.thickness;
    }
    z_levels.push(z0);

    let mut nodes = Vec::with_capacity(nodes_in_r * nodes_in_z);
    for z in z_levels {
        for i in 0..nodes_in_r {
            nodes.push(Node {
                r: i as f64 * dr,
                z,
            });
        }
    }

    nodes
}

/// Generates the element connectivity, layer by layer
///
/// Within a layer the radial column is the outer loop so that elements at
/// the same radius are adjacent; the assembler exploits this to reuse one
/// element matrix per column. Corner nodes are ordered bottom-left,
/// bottom-right, top-right, top-left.
fn element_nodes(elem_count: &[[usize; 2]]) -> Vec<Element> {
    let nodes_in_r = elem_count[0][0] + 1;
    let total: usize = elem_count.iter().map(|c| c[0] * c[1]).sum();

    let mut elements = Vec::with_capacity(total);
    let mut layer_top_row = 0usize;

    for (layer, count) in elem_count.iter().enumerate() {
        for col in 0..count[0] {
            for row in 0..count[1] {
                let top = (layer_top_row + row) * nodes_in_r + col;
                let bottom = top + nodes_in_r;
                elements.push(Element {
                    nodes: [bottom, bottom + 1, top + 1, top],
                    layer,
                });
            }
        }
        layer_top_row += count[1];
    }

    elements
}
