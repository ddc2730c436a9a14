use serde::{Deserialize, Serialize};

/// A single horizontal soil layer, ordered top to bottom
#[derive(Debug, Clone)]
pub struct Layer {
    pub depth: f64,
    pub thickness: f64,
    pub youngs_modulus: f64,
    pub poisson_ratio: f64,
    pub density: f64,
    pub damping: f64,
    pub lithology: String,
}

/// Boundary condition mode at the truncated mesh edges
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryMode {
    /// Bottom row fixed, radial edge free (mode 0)
    FixedBottom,
    /// Bottom row fixed, absorbing radial edge (mode 1)
    FixedBottomAbsorbingSide,
    /// Absorbing bottom, radial edge free (mode 2)
    AbsorbingBottom,
    /// Absorbing bottom and radial edge (mode 3)
    AbsorbingAll,
}

impl BoundaryMode {
    pub fn from_code(code: i64) -> Option<BoundaryMode> {
        match code {
            0 => Some(BoundaryMode::FixedBottom),
            1 => Some(BoundaryMode::FixedBottomAbsorbingSide),
            2 => Some(BoundaryMode::AbsorbingBottom),
            3 => Some(BoundaryMode::AbsorbingAll),
            _ => None,
        }
    }

    /// Whether all DOF on the lowest node row are constrained to zero
    pub fn bottom_fixed(&self) -> bool {
        matches!(
            self,
            BoundaryMode::FixedBottom | BoundaryMode::FixedBottomAbsorbingSide
        )
    }

    /// Whether radiation dashpots act on the outer radial edge
    pub fn side_absorbing(&self) -> bool {
        matches!(
            self,
            BoundaryMode::FixedBottomAbsorbingSide | BoundaryMode::AbsorbingAll
        )
    }

    /// Whether radiation dashpots act on the bottom edge
    pub fn bottom_absorbing(&self) -> bool {
        matches!(
            self,
            BoundaryMode::AbsorbingBottom | BoundaryMode::AbsorbingAll
        )
    }
}

/// Solution method for the dynamic transfer function
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalcMethod {
    Explicit,
    Harmonic,
    Auto,
}

impl CalcMethod {
    pub fn from_code(code: i64) -> Option<CalcMethod> {
        match code {
            1 => Some(CalcMethod::Explicit),
            2 => Some(CalcMethod::Harmonic),
            3 => Some(CalcMethod::Auto),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CalcMethod::Explicit => "Explicit time",
            CalcMethod::Harmonic => "Harmonic resp",
            CalcMethod::Auto => "Auto select",
        }
    }
}

/// Immutable run configuration, populated once after validation
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub name: String,
    pub layers: Vec<Layer>,
    pub max_calc_dist: f64,
    pub max_calc_depth: f64,
    pub min_layer_thickness: f64,
    pub min_element_size: f64,
    pub low_freq: f64,
    pub high_freq: f64,
    pub calc_method: CalcMethod,
    pub solver_type: i64,
    pub bounds: BoundaryMode,
    pub time_increment_factor: f64,
    pub time_increment_max_iterations: usize,
    pub time_increment_tolerance: f64,
    pub time_end_factor: f64,
    pub force_radius: f64,
    pub method_decision_factor: f64,
    pub max_element_ratio: f64,
    pub elements_per_wave: f64,
    pub freq_increment_factor: f64,
    pub forcing_freq_increment: f64,
    pub consistent_inf_stiffness: bool,
    pub consistent_inf_damping: bool,
    pub bench_time_steps: usize,
    pub bench_frequencies: usize,
}

/// A mesh grid point in the radial/vertical plane
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Node {
    pub r: f64,
    pub z: f64,
}

/// A 4-node axisymmetric ring element
///
/// Corner nodes are ordered bottom-left, bottom-right, top-right, top-left
/// to match the closed-form matrix convention in `element_matrices`.
#[derive(Debug, Clone)]
pub struct Element {
    pub nodes: [usize; 4],
    pub layer: usize,
}

/// The generated soil mesh with its per-layer discretization summary
#[derive(Debug)]
pub struct Mesh {
    pub nodes: Vec<Node>,
    pub elements: Vec<Element>,
    /// Per-layer [radial, vertical] element counts
    pub elem_count: Vec<[usize; 2]>,
    /// Per-layer maximum element sizes after clamping
    pub elem_size: Vec<f64>,
    /// Highest frequency the mesh can resolve; below `high_freq` when the
    /// minimum element size forced coarser elements
    pub max_freq_limited: f64,
}

impl Mesh {
    pub fn nodes_in_r(&self) -> usize {
        self.elem_count[0][0] + 1
    }

    pub fn elements_in_z(&self) -> usize {
        self.elem_count.iter().map(|c| c[1]).sum()
    }

    /// Indices of the nodes on the ground surface (z = 0)
    pub fn surface_nodes(&self) -> std::ops::Range<usize> {
        0..self.nodes_in_r()
    }
}

/// One displacement degree of freedom of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dof {
    /// Mapped to a global equation index
    Free(usize),
    /// Constrained to zero displacement
    Fixed,
}

impl Dof {
    /// Read a solution vector entry, with fixed DOF transparently zero
    pub fn read(&self, solution: &[f64]) -> f64 {
        match self {
            Dof::Free(i) => solution[*i],
            Dof::Fixed => 0.0,
        }
    }
}

/// Node-to-equation mapping for the whole mesh
#[derive(Debug)]
pub struct EquationMap {
    /// Per node: [radial DOF, vertical DOF]
    pub dofs: Vec<[Dof; 2]>,
    /// Total number of equations (free DOF)
    pub neq: usize,
}

impl EquationMap {
    /// Gather the 8 DOF of a 4-node element, alternating radial/vertical
    pub fn element_dofs(&self, nodes: &[usize; 4]) -> [Dof; 8] {
        let mut out = [Dof::Fixed; 8];
        for (i, &node) in nodes.iter().enumerate() {
            out[2 * i] = self.dofs[node][0];
            out[2 * i + 1] = self.dofs[node][1];
        }
        out
    }

    /// Gather the 4 DOF of a 2-node boundary edge element
    pub fn edge_dofs(&self, nodes: &[usize; 2]) -> [Dof; 4] {
        [
            self.dofs[nodes[0]][0],
            self.dofs[nodes[0]][1],
            self.dofs[nodes[1]][0],
            self.dofs[nodes[1]][1],
        ]
    }
}

/// Per-frequency transfer compliance at the surface nodes
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransferResult {
    #[serde(rename = "Frequency")]
    pub frequency: Vec<f64>,
    #[serde(rename = "Rcoord")]
    pub rcoord: Vec<f64>,
    /// Outer index: surface node, inner index: frequency
    #[serde(rename = "RDisp_real")]
    pub r_disp_real: Vec<Vec<f64>>,
    #[serde(rename = "RDisp_imag")]
    pub r_disp_imag: Vec<Vec<f64>>,
    #[serde(rename = "ZDisp_real")]
    pub z_disp_real: Vec<Vec<f64>>,
    #[serde(rename = "ZDisp_imag")]
    pub z_disp_imag: Vec<Vec<f64>>,
    #[serde(rename = "MaxFreqLimited", skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub max_freq_limited: Option<f64>,
}
