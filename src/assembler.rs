//! Assembly of the global sparse system matrices and the load vector.
//!
//! Elements are visited layer by layer and column by column; within one
//! radial column every element shares the same radii and height, so one
//! element matrix is computed per column and stamped down the column.
//! Entries belonging to fixed DOF are simply not pushed, which eliminates
//! the constrained equations during assembly.

use nalgebra::DVector;
use nalgebra_sparse::{coo::CooMatrix, csr::CsrMatrix};

use crate::{
    datatypes::{Dof, EquationMap, Mesh, RunConfig},
    element_matrices::{self, ElementMass, MassVariant},
    error::GroundwaveError,
    wave_speed::{p_wave_velocity, s_wave_velocity},
};

/// The assembled global system, sized by the number of free equations
///
/// `stiffness` carries the elastic stiffness plus the stiffness-like part
/// of the infinite boundary; `hyst_damp` the displacement-proportional
/// hysteretic damping; `inf_damp` the viscous radiation dashpots. Mass is
/// assembled separately per solution method.
pub struct GlobalSystem {
    pub stiffness: CsrMatrix<f64>,
    pub hyst_damp: CsrMatrix<f64>,
    pub inf_damp: CsrMatrix<f64>,
    pub force: DVector<f64>,
    pub neq: usize,
}

/// Assembles the stiffness, damping and force of the model
///
/// # Arguments
/// * `mesh` - The generated mesh
/// * `map` - The node-to-equation mapping
/// * `config` - The run configuration
pub fn assemble(
    mesh: &Mesh,
    map: &EquationMap,
    config: &RunConfig,
) -> Result<GlobalSystem, GroundwaveError> {
    let mut stiffness = CooMatrix::new(map.neq, map.neq);
    let mut hyst_damp = CooMatrix::new(map.neq, map.neq);

    let mut n = 0usize;
    for (layer_idx, layer) in config.layers.iter().enumerate() {
        let count = mesh.elem_count[layer_idx];
        let eta = layer.damping * 2.0;
        for _col in 0..count[0] {
            let element = &mesh.elements[n];
            debug_assert_eq!(element.layer, layer_idx);
            let (r0, r1, b) = element_geometry(mesh, element.nodes);
            let elem_stiff = element_matrices::stiffness(
                r0,
                r1,
                b,
                layer.youngs_modulus,
                layer.poisson_ratio,
            );
            for _row in 0..count[1] {
                let dofs = map.element_dofs(&mesh.elements[n].nodes);
                for j in 0..8 {
                    for i in 0..8 {
                        let (Dof::Free(row), Dof::Free(col)) = (dofs[i], dofs[j]) else {
                            continue;
                        };
                        stiffness.push(row, col, elem_stiff[(i, j)]);
                        hyst_damp.push(row, col, elem_stiff[(i, j)] * eta);
                    }
                }
                n += 1;
            }
        }
    }

    add_boundary_stiffness(&mut stiffness, mesh, map, config);
    let inf_damp = boundary_damping(mesh, map, config);
    let force = external_force(mesh, map, config.force_radius)?;

    println!(
        "info: assembled {} equations with {} stiffness entries",
        map.neq,
        stiffness.nnz()
    );

    Ok(GlobalSystem {
        stiffness: CsrMatrix::from(&stiffness),
        hyst_damp: CsrMatrix::from(&hyst_damp),
        inf_damp: CsrMatrix::from(&inf_damp),
        force,
        neq: map.neq,
    })
}

/// Assembles the diagonal lumped mass vector for explicit integration
pub fn lumped_mass(mesh: &Mesh, map: &EquationMap, config: &RunConfig) -> DVector<f64> {
    let mut mass = DVector::zeros(map.neq);

    let mut n = 0usize;
    for (layer_idx, layer) in config.layers.iter().enumerate() {
        let count = mesh.elem_count[layer_idx];
        for _col in 0..count[0] {
            let element = &mesh.elements[n];
            let (r0, r1, b) = element_geometry(mesh, element.nodes);
            let ElementMass::Lumped(elem_mass) =
                element_matrices::mass(r0, r1, b, layer.density, MassVariant::LumpedExact)
            else {
                unreachable!("lumped variant always yields diagonal entries");
            };
            for _row in 0..count[1] {
                let dofs = map.element_dofs(&mesh.elements[n].nodes);
                for i in 0..8 {
                    if let Dof::Free(eq) = dofs[i] {
                        mass[eq] += elem_mass[i];
                    }
                }
                n += 1;
            }
        }
    }

    mass
}

/// Assembles the consistent mass matrix for harmonic response analysis
///
/// The 4x4 nodal block applies once to the radial DOF set and once to the
/// vertical DOF set of each element.
pub fn consistent_mass(mesh: &Mesh, map: &EquationMap, config: &RunConfig) -> CsrMatrix<f64> {
    let mut mass = CooMatrix::new(map.neq, map.neq);

    let mut n = 0usize;
    for (layer_idx, layer) in config.layers.iter().enumerate() {
        let count = mesh.elem_count[layer_idx];
        for _col in 0..count[0] {
            let element = &mesh.elements[n];
            let (r0, r1, b) = element_geometry(mesh, element.nodes);
            let ElementMass::Consistent(block) =
                element_matrices::mass(r0, r1, b, layer.density, MassVariant::ConsistentExact)
            else {
                unreachable!("consistent variant always yields a nodal block");
            };
            for _row in 0..count[1] {
                let dofs = map.element_dofs(&mesh.elements[n].nodes);
                for direction in 0..2 {
                    for j in 0..4 {
                        for i in 0..4 {
                            let (Dof::Free(row), Dof::Free(col)) =
                                (dofs[2 * i + direction], dofs[2 * j + direction])
                            else {
                                continue;
                            };
                            mass.push(row, col, block[(i, j)]);
                        }
                    }
                }
                n += 1;
            }
        }
    }

    CsrMatrix::from(&mass)
}

fn element_geometry(mesh: &Mesh, nodes: [usize; 4]) -> (f64, f64, f64) {
    let r0 = mesh.nodes[nodes[0]].r;
    let r1 = mesh.nodes[nodes[1]].r;
    let b = mesh.nodes[nodes[3]].z - mesh.nodes[nodes[0]].z;
    (r0, r1, b)
}

fn push_edge(
    coo: &mut CooMatrix<f64>,
    dofs: &[Dof; 4],
    matrix: &element_matrices::EdgeMatrix,
) {
    for (i, j, value) in matrix.entries() {
        let (Dof::Free(row), Dof::Free(col)) = (dofs[i], dofs[j]) else {
            continue;
        };
        coo.push(row, col, value);
    }
}

/// Nodes of the edge elements along the outer radial boundary, ordered top
/// to bottom; element i connects the rightmost nodes of rows i and i+1
fn side_edges(mesh: &Mesh) -> Vec<[usize; 2]> {
    let nodes_in_r = mesh.nodes_in_r();
    (0..mesh.elements_in_z())
        .map(|i| [(i + 1) * nodes_in_r - 1, (i + 2) * nodes_in_r - 1])
        .collect()
}

/// Nodes of the edge elements along the bottom boundary, inner to outer
fn bottom_edges(mesh: &Mesh) -> Vec<[usize; 2]> {
    let first = mesh.nodes_in_r() * mesh.elements_in_z();
    (0..mesh.nodes_in_r() - 1)
        .map(|i| [first + i, first + i + 1])
        .collect()
}

/// Adds the stiffness-like dashpot terms of the infinite boundary
///
/// The side edges take the impedance of their own layer; the bottom edge
/// represents the half-space below and takes the deepest layer throughout.
fn add_boundary_stiffness(
    stiffness: &mut CooMatrix<f64>,
    mesh: &Mesh,
    map: &EquationMap,
    config: &RunConfig,
) {
    let consistent = config.consistent_inf_stiffness;

    if config.bounds.side_absorbing() {
        let edges = side_edges(mesh);
        let r = mesh.nodes[edges[0][0]].r;
        let mut n = 0usize;
        for (layer_idx, layer) in config.layers.iter().enumerate() {
            let vs = s_wave_velocity(layer.youngs_modulus, layer.poisson_ratio, layer.density);
            let vp = p_wave_velocity(layer.youngs_modulus, layer.poisson_ratio, layer.density);
            let ds = vs * vs * layer.density / 2.0;
            let dp = vp * vp * layer.density / 2.0;
            for _ in 0..mesh.elem_count[layer_idx][1] {
                let b0 = mesh.nodes[edges[n][0]].z;
                let b1 = mesh.nodes[edges[n][1]].z;
                let edge = element_matrices::side_inf_stiffness(r, b0, b1, ds, dp, consistent);
                push_edge(stiffness, &map.edge_dofs(&edges[n]), &edge);
                n += 1;
            }
        }
    }

    if config.bounds.bottom_absorbing() {
        let deepest = config.layers.last().expect("validated: at least one layer");
        let vs = s_wave_velocity(deepest.youngs_modulus, deepest.poisson_ratio, deepest.density);
        let vp = p_wave_velocity(deepest.youngs_modulus, deepest.poisson_ratio, deepest.density);
        let ds = vs * vs * deepest.density / 2.0;
        let dp = vp * vp * deepest.density / 2.0;
        for edge_nodes in bottom_edges(mesh) {
            let b = mesh.nodes[edge_nodes[0]].z;
            let r0 = mesh.nodes[edge_nodes[0]].r;
            let r1 = mesh.nodes[edge_nodes[1]].r;
            let edge = element_matrices::bottom_inf_stiffness(b, r0, r1, ds, dp, consistent);
            push_edge(stiffness, &map.edge_dofs(&edge_nodes), &edge);
        }
    }
}

/// Assembles the viscous radiation dashpots of the infinite boundary
fn boundary_damping(mesh: &Mesh, map: &EquationMap, config: &RunConfig) -> CooMatrix<f64> {
    let mut damping = CooMatrix::new(map.neq, map.neq);
    let consistent = config.consistent_inf_damping;

    if config.bounds.side_absorbing() {
        let edges = side_edges(mesh);
        let r = mesh.nodes[edges[0][0]].r;
        let mut n = 0usize;
        for (layer_idx, layer) in config.layers.iter().enumerate() {
            let vs = s_wave_velocity(layer.youngs_modulus, layer.poisson_ratio, layer.density);
            let vp = p_wave_velocity(layer.youngs_modulus, layer.poisson_ratio, layer.density);
            let ds = vs * layer.density;
            let dp = vp * layer.density;
            for _ in 0..mesh.elem_count[layer_idx][1] {
                let b0 = mesh.nodes[edges[n][0]].z;
                let b1 = mesh.nodes[edges[n][1]].z;
                let edge = element_matrices::side_inf_damping(r, b0, b1, ds, dp, consistent);
                push_edge(&mut damping, &map.edge_dofs(&edges[n]), &edge);
                n += 1;
            }
        }
    }

    if config.bounds.bottom_absorbing() {
        let deepest = config.layers.last().expect("validated: at least one layer");
        let vs = s_wave_velocity(deepest.youngs_modulus, deepest.poisson_ratio, deepest.density);
        let vp = p_wave_velocity(deepest.youngs_modulus, deepest.poisson_ratio, deepest.density);
        let ds = vs * deepest.density;
        let dp = vp * deepest.density;
        for edge_nodes in bottom_edges(mesh) {
            let r0 = mesh.nodes[edge_nodes[0]].r;
            let r1 = mesh.nodes[edge_nodes[1]].r;
            let edge = element_matrices::bottom_inf_damping(r0, r1, ds, dp, consistent);
            push_edge(&mut damping, &map.edge_dofs(&edge_nodes), &edge);
        }
    }

    damping
}

/// Builds the load vector of a unit vertical force on the surface
///
/// The force is applied as a uniform pressure over a disc whose rim snaps
/// to the surface node closest to the requested radius; each surface
/// segment inside the disc contributes its exactly integrated share to the
/// vertical DOF of its two nodes. Magnitudes are per radian, consistent
/// with the element matrices.
fn external_force(
    mesh: &Mesh,
    map: &EquationMap,
    force_radius: f64,
) -> Result<DVector<f64>, GroundwaveError> {
    let surface: Vec<f64> = mesh.surface_nodes().map(|i| mesh.nodes[i].r).collect();

    let mut outer_idx = 1usize;
    let mut best = f64::INFINITY;
    for (i, &r) in surface.iter().enumerate() {
        let dist = (r - force_radius).abs();
        if dist < best {
            best = dist;
            outer_idx = i;
        }
    }
    let outer_idx = outer_idx.max(1);
    let outer_radius = surface[outer_idx];
    if outer_radius <= 0.0 {
        return Err(GroundwaveError::Validation(format!(
            "Error: force radius {} does not span any surface element\n",
            force_radius
        )));
    }
    let pressure = 1.0 / (std::f64::consts::PI * outer_radius * outer_radius);

    let mut force = DVector::zeros(map.neq);
    for i in 1..=outer_idx {
        let r_in = surface[i - 1];
        let r_out = surface[i];
        let fac = pressure * (r_out - r_in) / 6.0;
        if let Dof::Free(eq) = map.dofs[i - 1][1] {
            force[eq] += fac * (r_out + 2.0 * r_in);
        }
        if let Dof::Free(eq) = map.dofs[i][1] {
            force[eq] += fac * (2.0 * r_out + r_in);
        }
    }

    Ok(force)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bookkeeping;
    use crate::datatypes::BoundaryMode;
    use crate::mesher;
    use crate::mesher::tests::{sand_layer, test_config};
    use approx::assert_relative_eq;
    use nalgebra::DMatrix;

    fn dense(csr: &CsrMatrix<f64>) -> DMatrix<f64> {
        let mut out = DMatrix::zeros(csr.nrows(), csr.ncols());
        for (i, j, v) in csr.triplet_iter() {
            out[(i, j)] += v;
        }
        out
    }

    fn small_model(bounds: BoundaryMode) -> (RunConfig, Mesh, EquationMap) {
        let mut config = test_config(vec![sand_layer(0.0, 10.0), sand_layer(-10.0, 10.0)]);
        config.bounds = bounds;
        let mesh = mesher::run(&config).unwrap();
        let map = bookkeeping::mapping(&mesh, bounds);
        (config, mesh, map)
    }

    #[test]
    fn system_dimensions_match_equation_count() {
        let (config, mesh, map) = small_model(BoundaryMode::AbsorbingAll);
        let system = assemble(&mesh, &map, &config).unwrap();

        assert_eq!(system.neq, map.neq);
        assert_eq!(system.stiffness.nrows(), map.neq);
        assert_eq!(system.stiffness.ncols(), map.neq);
        assert_eq!(system.hyst_damp.nrows(), map.neq);
        assert_eq!(system.inf_damp.nrows(), map.neq);
        assert_eq!(system.force.len(), map.neq);
    }

    #[test]
    fn global_matrices_are_symmetric() {
        let (config, mesh, map) = small_model(BoundaryMode::AbsorbingAll);
        let system = assemble(&mesh, &map, &config).unwrap();

        for matrix in [&system.stiffness, &system.hyst_damp, &system.inf_damp] {
            let m = dense(matrix);
            let scale = m.amax().max(1.0);
            for i in 0..m.nrows() {
                for j in 0..i {
                    assert!(
                        (m[(i, j)] - m[(j, i)]).abs() <= 1e-9 * scale,
                        "asymmetry at ({}, {})",
                        i,
                        j
                    );
                }
            }
        }
    }

    #[test]
    fn fixed_bottom_drops_boundary_damping() {
        let (config, mesh, map) = small_model(BoundaryMode::FixedBottom);
        let system = assemble(&mesh, &map, &config).unwrap();
        assert_eq!(system.inf_damp.nnz(), 0);
    }

    #[test]
    fn hysteretic_damping_scales_with_loss_factor() {
        let (config, mesh, map) = small_model(BoundaryMode::FixedBottom);
        let system = assemble(&mesh, &map, &config).unwrap();

        // uniform damping ratio: Ch = 2 * damping * K_elastic exactly
        let k = dense(&system.stiffness);
        let c = dense(&system.hyst_damp);
        let eta = 2.0 * config.layers[0].damping;
        let scale = k.amax();
        for i in 0..k.nrows() {
            for j in 0..k.ncols() {
                assert!((c[(i, j)] - eta * k[(i, j)]).abs() <= 1e-9 * scale);
            }
        }
    }

    #[test]
    fn total_vertical_force_is_unit_load_per_radian() {
        let (config, mesh, map) = small_model(BoundaryMode::AbsorbingAll);
        let system = assemble(&mesh, &map, &config).unwrap();

        // integrating the disc pressure over the disc gives 1/(2 pi) per radian
        let total: f64 = system.force.iter().sum();
        assert_relative_eq!(
            total,
            1.0 / (2.0 * std::f64::consts::PI),
            max_relative = 1e-12
        );
    }

    #[test]
    fn force_only_loads_surface_vertical_dofs() {
        let (config, mesh, map) = small_model(BoundaryMode::AbsorbingAll);
        let system = assemble(&mesh, &map, &config).unwrap();

        let mut loaded: Vec<usize> = Vec::new();
        for (eq, value) in system.force.iter().enumerate() {
            if *value != 0.0 {
                loaded.push(eq);
            }
        }
        assert!(!loaded.is_empty());

        let surface_vertical: Vec<usize> = mesh
            .surface_nodes()
            .filter_map(|n| match map.dofs[n][1] {
                Dof::Free(eq) => Some(eq),
                Dof::Fixed => None,
            })
            .collect();
        for eq in loaded {
            assert!(surface_vertical.contains(&eq));
        }
    }

    #[test]
    fn lumped_mass_is_positive_everywhere() {
        let (config, mesh, map) = small_model(BoundaryMode::AbsorbingAll);
        let mass = lumped_mass(&mesh, &map, &config);
        assert_eq!(mass.len(), map.neq);
        assert!(mass.iter().all(|&m| m > 0.0));
    }

    #[test]
    fn consistent_mass_rows_sum_to_lumped_mass() {
        let (config, mesh, map) = small_model(BoundaryMode::AbsorbingAll);
        let lumped = lumped_mass(&mesh, &map, &config);
        let consistent = dense(&consistent_mass(&mesh, &map, &config));

        // with a free bottom row no vertical DOF is constrained, so the
        // vertical mass rows lose nothing to eliminated columns
        for node in 0..mesh.nodes.len() {
            if let Dof::Free(eq) = map.dofs[node][1] {
                let row_sum: f64 = consistent.row(eq).iter().sum();
                assert_relative_eq!(row_sum, lumped[eq], max_relative = 1e-9);
            }
        }
    }
}
