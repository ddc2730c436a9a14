use crate::datatypes::{BoundaryMode, Dof, EquationMap, Mesh};

/// Assigns a global equation index to every free degree of freedom
///
/// Radial DOF on the symmetry axis are always fixed; for boundary modes
/// with a rigid bottom, both DOF of the lowest node row are fixed as well.
/// Free DOF are numbered consecutively in row-major node order, radial
/// before vertical within a node.
///
/// # Arguments
/// * `mesh` - The generated mesh
/// * `bounds` - The boundary condition mode
///
/// # Returns
/// The equation map holding the `Dof` of every node
pub fn mapping(mesh: &Mesh, bounds: BoundaryMode) -> EquationMap {
    let bottom_z = mesh
        .nodes
        .iter()
        .map(|n| n.z)
        .fold(f64::INFINITY, f64::min);

    let mut dofs = Vec::with_capacity(mesh.nodes.len());
    let mut neq = 0usize;

    for node in &mesh.nodes {
        let radial_fixed = node.r == 0.0;
        let bottom_fixed = bounds.bottom_fixed() && node.z == bottom_z;

        let radial = if radial_fixed || bottom_fixed {
            Dof::Fixed
        } else {
            let eq = Dof::Free(neq);
            neq += 1;
            eq
        };
        let vertical = if bottom_fixed {
            Dof::Fixed
        } else {
            let eq = Dof::Free(neq);
            neq += 1;
            eq
        };

        dofs.push([radial, vertical]);
    }

    EquationMap { dofs, neq }
}
