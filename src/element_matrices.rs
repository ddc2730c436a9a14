//! Closed-form matrices for the 4-node axisymmetric ring element and the
//! 2-node infinite boundary edge elements.
//!
//! Local DOF ordering is radial, vertical per node, with corner nodes in
//! bottom-left, bottom-right, top-right, top-left order. All matrices are
//! integrated per radian of circumference; the 2*pi factor cancels against
//! the force vector, which drops it as well.

use nalgebra::SMatrix;

/// The five mass matrix consistency variants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MassVariant {
    /// Nodal lumping with integration points at the nodes
    Nodal,
    /// Consistent mass with exact integration
    ConsistentExact,
    /// Lumped by row-summing the exact consistent mass
    LumpedExact,
    /// Consistent mass with a single integration point
    ConsistentOnePoint,
    /// Lumped by row-summing the 1-point consistent mass
    LumpedOnePoint,
}

/// An element mass matrix in one of two storage shapes
///
/// The consistent variants carry a 4x4 nodal block that applies unchanged
/// to the radial DOF set and the vertical DOF set; the lumped variants
/// carry the 8 diagonal entries directly.
#[derive(Debug)]
pub enum ElementMass {
    Lumped([f64; 8]),
    Consistent(SMatrix<f64, 4, 4>),
}

/// Computes the element mass matrix for a 4-node axisymmetric ring
///
/// # Arguments
/// * `r0` - Inner radius of the element
/// * `r1` - Outer radius of the element
/// * `b` - Element height
/// * `rho` - Mass density
/// * `variant` - The consistency variant
pub fn mass(r0: f64, r1: f64, b: f64, rho: f64, variant: MassVariant) -> ElementMass {
    match variant {
        MassVariant::Nodal => {
            let fac = (r1 - r0) * b / 4.0 * rho;
            let inner = r0 * fac;
            let outer = r1 * fac;
            ElementMass::Lumped([inner, inner, outer, outer, outer, outer, inner, inner])
        }
        MassVariant::ConsistentExact => {
            let fac = (r1 - r0) * b / 72.0 * rho;
            let m00 = (6.0 * r0 + 2.0 * r1) * fac;
            let m01 = (2.0 * r0 + 2.0 * r1) * fac;
            let m02 = (r0 + r1) * fac;
            let m03 = (3.0 * r0 + r1) * fac;
            let m11 = (2.0 * r0 + 6.0 * r1) * fac;
            let m12 = (r0 + 3.0 * r1) * fac;
            ElementMass::Consistent(nalgebra::matrix![
                m00, m01, m02, m03;
                m01, m11, m12, m02;
                m02, m12, m11, m01;
                m03, m02, m01, m00;
            ])
        }
        MassVariant::LumpedExact => {
            let fac = (r1 - r0) * b / 12.0 * rho;
            let inner = (2.0 * r0 + r1) * fac;
            let outer = (r0 + 2.0 * r1) * fac;
            ElementMass::Lumped([inner, inner, outer, outer, outer, outer, inner, inner])
        }
        MassVariant::ConsistentOnePoint => {
            let entry = (r1 - r0) * (r1 + r0) * b / 128.0 * rho;
            ElementMass::Consistent(SMatrix::repeat(entry))
        }
        MassVariant::LumpedOnePoint => {
            let entry = (r1 - r0) * (r1 + r0) * b / 32.0 * rho;
            ElementMass::Lumped([entry; 8])
        }
    }
}

/// Computes the closed-form 8x8 stiffness matrix of a 4-node axisymmetric
/// ring element
///
/// Sixteen entries are evaluated from the closed-form expressions; the
/// remainder follows from symmetry and the sign relations between the
/// radial and vertical couplings.
///
/// # Arguments
/// * `r0` - Inner radius of the element
/// * `r1` - Outer radius of the element
/// * `b` - Element height
/// * `e` - Young's modulus
/// * `nu` - Poisson ratio
pub fn stiffness(r0: f64, r1: f64, b: f64, e: f64, nu: f64) -> SMatrix<f64, 8, 8> {
    let e_fac = e / ((1.0 + nu) * (1.0 - 2.0 * nu));
    let fac1 = e_fac
        / (24.0
            * b
            * (-r0.powi(4) - 4.0 * r0.powi(3) * r1 + 4.0 * r0 * r1.powi(3) + r1.powi(4)));
    let fac2 = e_fac / (24.0 * (r0 + r1));
    let fac3 = e_fac / (36.0 * b * (r0 * r0 - r1 * r1));
    let fac4 = fac3 / 2.0;
    let fac5 = 1.0 - 2.0 * nu;
    let r0_2 = r0 * r0;
    let r0_4 = r0_2 * r0_2;
    let r1_2 = r1 * r1;
    let r1_4 = r1_2 * r1_2;
    let r01 = r0 * r1;
    let nu_2 = nu * nu;
    let b_2 = b * b;

    // Entries are stored column-major; k[c * 8 + r] holds K(r, c)
    let mut k = [0.0f64; 64];

    k[0] = fac1
        * (r0_4
            * (10.0 * fac5 * r01 - 9.0 * fac5 * r1_2
                + (7.0 - 2.0 * nu_2 - nu) * b_2
                + 3.0 * fac5 * r0_2)
            + r1_4
                * ((9.0 - 2.0 * nu_2 - 15.0 * nu) * b_2
                    + 5.0 * fac5 * r0_2
                    + 6.0 * fac5 * r01
                    + fac5 * r1_2)
            + r0_2
                * ((30.0 - 12.0 * nu_2 - 6.0 * nu) * r01 * b_2
                    + (24.0 - 24.0 * nu - 20.0 * nu_2) * r1_2 * b_2
                    - 16.0 * fac5 * r0 * r1.powi(3))
            + r1_2 * (26.0 - 12.0 * nu_2 - 50.0 * nu) * r01 * b_2);
    k[1] = fac2 * (2.0 * r0 + r1) * (r0 * (1.0 + 2.0 * nu) + r1 * fac5);
    k[2] = fac1
        * (r0_4 * ((2.0 * nu_2 + nu - 1.0) * b_2 + fac5 * r0_2 - fac5 * r1_2 + 4.0 * fac5 * r01)
            + r1_4
                * ((2.0 * nu_2 + nu - 1.0) * b_2 - fac5 * r0_2 + 4.0 * fac5 * r01 + fac5 * r1_2)
            + r0_2
                * ((12.0 * nu_2 + 20.0 * nu - 20.0) * b_2 * r01
                    + (20.0 * b_2 * nu_2 + 54.0 * b_2 * nu + 16.0 * nu * r01) * r1_2)
            + r1_2
                * ((12.0 * nu_2 + 20.0 * nu - 20.0) * b_2 * r01
                    - (54.0 * b_2 + 8.0 * r01) * r0_2));
    k[3] = fac2 * (r0_2 * (8.0 * nu - 2.0) + r01 * (14.0 * nu - 3.0) - r1_2 * fac5);
    k[4] = fac1
        * (r0_4
            * ((1.0 - 2.0 * nu_2 - nu) * b_2 - fac5 * r0_2 - 4.0 * fac5 * r01 + fac5 * r1_2)
            + r1_4
                * ((1.0 - 2.0 * nu_2 - nu) * b_2 + fac5 * r0_2 - 4.0 * fac5 * r01 - fac5 * r1_2)
            + r0_2
                * ((4.0 * nu - 12.0 * nu_2 - 4.0) * b_2 * r01
                    + (42.0 * nu - 20.0 * nu_2) * b_2 * r1_2
                    - 16.0 * nu * r0 * r1.powi(3))
            + r1_2
                * ((4.0 * nu - 12.0 * nu_2 - 4.0) * b_2 * r01 + (8.0 * r01 - 42.0 * b_2) * r0_2));
    k[5] = fac2 * (-r1_2 * fac5 - r01 * (3.0 + 2.0 * nu) - 2.0 * r0_2);
    k[6] = fac1
        * (r0_4
            * ((2.0 * nu_2 + nu + 5.0) * b_2 - 3.0 * fac5 * r0_2 - 10.0 * fac5 * r01
                + 9.0 * fac5 * r1_2)
            + r1_4
                * ((2.0 * nu_2 - 9.0 * nu + 3.0) * b_2
                    - 5.0 * fac5 * r0_2
                    - 6.0 * fac5 * r01
                    - fac5 * r1_2)
            + r0_2
                * ((12.0 * nu_2 + 6.0 * nu + 18.0) * b_2 * r01
                    + (20.0 * b_2 * nu_2 - 32.0 * nu * r01) * r1_2)
            + r1_2 * ((12.0 * nu_2 - 46.0 * nu + 22.0) * b_2 * r01 + 16.0 * r0.powi(3) * r1));
    k[7] = fac2 * (2.0 * r0 + r1) * (r0 * (1.0 - 6.0 * nu) + r1 * fac5);

    k[8] = k[1];
    k[9] = fac3
        * (r0_4 * (2.0 * nu_2 + 9.0 * nu - 9.0)
            + r1_4 * (2.0 * nu_2 + 3.0 * nu - 3.0)
            + r0_2
                * (-3.0 * fac5 * b_2
                    + (4.0 * nu_2 - 6.0 * nu + 6.0) * r01
                    + (12.0 - 12.0 * nu_2) * r1_2)
            + r1_2
                * (-3.0 * fac5 * b_2 + (4.0 * nu_2 + 6.0 * nu - 6.0) * r01 - 12.0 * nu * r0_2)
            - 6.0 * r01 * fac5 * b_2);
    k[10] = fac2 * (r0_2 * fac5 + r01 * (3.0 - 14.0 * nu) + r1_2 * (2.0 - 8.0 * nu));
    k[11] = fac3
        * (r0_4 * (3.0 * nu - 2.0 * nu_2 - 3.0)
            + r1_4 * (3.0 * nu - 2.0 * nu_2 - 3.0)
            + r0_2 * (3.0 * fac5 * b_2 - 4.0 * nu_2 * r01 + (6.0 + 12.0 * nu_2) * r1_2)
            + r1_2 * (3.0 * fac5 * b_2 - 4.0 * nu_2 * r01 - 6.0 * nu * r0_2)
            + r01 * 6.0 * fac5 * b_2);
    k[12] = fac2 * (-r0_2 * fac5 - r01 * (3.0 + 2.0 * nu) - 2.0 * r1_2);
    k[13] = fac4
        * (r0_4 * (4.0 * nu_2 - 6.0 * nu + 6.0)
            + r1_4 * (4.0 * nu_2 - 6.0 * nu + 6.0)
            + r0_2 * (3.0 * fac5 * b_2 + 8.0 * nu_2 * r01 - (24.0 * nu_2 + 12.0) * r1_2)
            + r1_2 * (3.0 * fac5 * b_2 + 8.0 * nu_2 * r01 + 12.0 * nu * r0_2)
            + r01 * 6.0 * fac5 * b_2);
    k[14] = -k[7];
    k[15] = fac4
        * (r0_4 * (18.0 - 4.0 * nu_2 - 18.0 * nu)
            + r1_4 * (6.0 - 4.0 * nu_2 - 6.0 * nu)
            + r0_2
                * (-3.0 * fac5 * b_2
                    + (12.0 * nu - 8.0 * nu_2 - 12.0) * r01
                    + 24.0 * nu * (nu + 1.0) * r1_2)
            + r1_2
                * (-3.0 * fac5 * b_2 + (12.0 - 8.0 * nu_2 - 12.0 * nu) * r01 - 24.0 * r0_2)
            - r01 * 6.0 * fac5 * b_2);

    k[16] = k[2];
    k[17] = k[10];
    k[18] = fac1
        * (r0_4
            * ((9.0 - 2.0 * nu_2 - 15.0 * nu) * b_2
                + fac5 * r0_2
                + 6.0 * fac5 * r01
                + 5.0 * fac5 * r1_2)
            + r1_4
                * ((7.0 - 2.0 * nu_2 - nu) * b_2 - 9.0 * fac5 * r0_2
                    + 10.0 * fac5 * r01
                    + 3.0 * fac5 * r1_2)
            + r0_2
                * ((26.0 - 50.0 * nu - 12.0 * nu_2) * b_2 * r01
                    + (32.0 * nu * r01 - 20.0 * b_2 * nu_2 - 24.0 * b_2 * nu) * r1_2)
            + r1_2
                * ((30.0 - 12.0 * nu_2 - 6.0 * nu) * b_2 * r01 + (24.0 * b_2 - 16.0 * r01) * r0_2));
    k[19] = -fac2 * (r0 + 2.0 * r1) * (r0 * fac5 + r1 * (1.0 + 2.0 * nu));
    k[20] = fac1
        * (r0_4
            * ((2.0 * nu_2 - 9.0 * nu + 3.0) * b_2 - fac5 * r0_2 - 6.0 * fac5 * r01
                - 5.0 * fac5 * r1_2)
            + r1_4
                * ((2.0 * nu_2 + nu + 5.0) * b_2 + 9.0 * fac5 * r0_2
                    - 10.0 * fac5 * r01
                    - 3.0 * fac5 * r1_2)
            + r0_2
                * ((12.0 * nu_2 - 46.0 * nu + 22.0) * b_2 * r01
                    + (20.0 * b_2 * nu_2 - 32.0 * nu * r01) * r1_2)
            + r1_2 * ((12.0 * nu_2 + 6.0 * nu + 18.0) * b_2 * r01 + 16.0 * r0.powi(3) * r1));
    k[21] = -fac2 * (r0 + 2.0 * r1) * (r0 * fac5 + r1 * (1.0 - 6.0 * nu));
    k[22] = k[4];
    k[23] = -k[12];

    k[24] = k[3];
    k[25] = k[11];
    k[26] = k[19];
    k[27] = fac3
        * (r0_4 * (2.0 * nu_2 + 3.0 * nu - 3.0)
            + r1_4 * (2.0 * nu_2 + 9.0 * nu - 9.0)
            + r0_2
                * (-3.0 * fac5 * b_2
                    + (4.0 * nu_2 + 6.0 * nu - 6.0) * r01
                    + 12.0 * (1.0 - nu_2) * r1_2)
            + r1_2
                * (-3.0 * fac5 * b_2 + (4.0 * nu_2 - 6.0 * nu + 6.0) * r01 - 12.0 * nu * r0_2)
            - r01 * 6.0 * fac5 * b_2);
    k[28] = -k[21];
    k[29] = fac4
        * (r0_4 * (6.0 - 4.0 * nu_2 - 6.0 * nu)
            + r1_4 * (18.0 - 4.0 * nu_2 - 18.0 * nu)
            + r0_2
                * (-3.0 * fac5 * b_2
                    + (12.0 - 8.0 * nu_2 - 12.0 * nu) * r01
                    + 24.0 * (nu_2 - 1.0) * r1_2)
            + r1_2
                * (-3.0 * fac5 * b_2 + (12.0 * nu - 8.0 * nu_2 - 12.0) * r01 + 24.0 * nu * r0_2)
            - r01 * 6.0 * fac5 * b_2);
    k[30] = -k[5];
    k[31] = k[13];

    k[32] = k[4];
    k[33] = k[12];
    k[34] = k[20];
    k[35] = k[28];
    k[36] = k[18];
    k[37] = -k[19];
    k[38] = k[2];
    k[39] = -k[10];

    k[40] = k[5];
    k[41] = k[13];
    k[42] = k[21];
    k[43] = k[29];
    k[44] = k[37];
    k[45] = k[27];
    k[46] = -k[3];
    k[47] = k[11];

    k[48] = k[6];
    k[49] = k[14];
    k[50] = k[22];
    k[51] = k[30];
    k[52] = k[38];
    k[53] = k[46];
    k[54] = k[0];
    k[55] = -k[1];

    k[56] = k[7];
    k[57] = k[15];
    k[58] = k[23];
    k[59] = k[31];
    k[60] = k[39];
    k[61] = k[47];
    k[62] = k[55];
    k[63] = k[9];

    SMatrix::from_column_slice(&k)
}

/// A 2-node infinite boundary edge element matrix
///
/// `TwoPoint` holds the four diagonal entries in local DOF order. The
/// `Consistent` entries sit at positions (0,0), (0,2), (1,1), (1,3),
/// (2,0), (2,2), (3,1), (3,3): each DOF couples with the same-direction
/// DOF of the other edge node.
#[derive(Debug)]
pub enum EdgeMatrix {
    TwoPoint([f64; 4]),
    Consistent([f64; 8]),
}

impl EdgeMatrix {
    /// Yields the (local row, local col, value) entries of the edge matrix
    pub fn entries(&self) -> Vec<(usize, usize, f64)> {
        match self {
            EdgeMatrix::TwoPoint(v) => {
                (0..4).map(|i| (i, i, v[i])).collect()
            }
            EdgeMatrix::Consistent(v) => {
                const ROWS: [usize; 8] = [0, 0, 1, 1, 2, 2, 3, 3];
                const COLS: [usize; 8] = [0, 2, 1, 3, 0, 2, 1, 3];
                (0..8).map(|i| (ROWS[i], COLS[i], v[i])).collect()
            }
        }
    }
}

/// Stiffness-like dashpots on the outer radial edge
///
/// # Arguments
/// * `r` - Radius of the edge
/// * `b0`, `b1` - Vertical coordinates of the two edge nodes
/// * `ds` - Shear impedance term, vs^2 * rho / 2
/// * `dp` - Compressive impedance term, vp^2 * rho / 2
/// * `consistent` - Selects the consistent distribution over the 2-point one
pub fn side_inf_stiffness(r: f64, b0: f64, b1: f64, ds: f64, dp: f64, consistent: bool) -> EdgeMatrix {
    let rb = r * (b0 - b1).abs();
    if consistent {
        let sqrt3 = 3.0f64.sqrt();
        let fac1 = ((b0 * (sqrt3 + 3.0) - b1 * (sqrt3 - 3.0)).powi(2) + 36.0 * r * r).sqrt();
        let fac2 = ((b0 * (sqrt3 - 3.0) - b1 * (sqrt3 + 3.0)).powi(2) + 36.0 * r * r).sqrt();
        let near = (sqrt3 / 2.0 + 1.0) / fac1 - (sqrt3 / 2.0 - 1.0) / fac2;
        let far = (sqrt3 / 2.0 + 1.0) / fac2 - (sqrt3 / 2.0 - 1.0) / fac1;
        let cross = (1.0 / fac1 + 1.0 / fac2) / 2.0;
        EdgeMatrix::Consistent([
            dp * rb * near,
            dp * rb * cross,
            ds * rb * near,
            ds * rb * cross,
            dp * rb * cross,
            dp * rb * far,
            ds * rb * cross,
            ds * rb * far,
        ])
    } else {
        let len0 = (b0 * b0 + r * r).sqrt();
        let len1 = (b1 * b1 + r * r).sqrt();
        EdgeMatrix::TwoPoint([
            dp * rb / (2.0 * len0),
            ds * rb / (2.0 * len0),
            dp * rb / (2.0 * len1),
            ds * rb / (2.0 * len1),
        ])
    }
}

/// Viscous radiation dashpots on the outer radial edge
///
/// # Arguments
/// * `r` - Radius of the edge
/// * `b0`, `b1` - Vertical coordinates of the two edge nodes
/// * `ds` - Shear impedance, vs * rho
/// * `dp` - Compressive impedance, vp * rho
pub fn side_inf_damping(r: f64, b0: f64, b1: f64, ds: f64, dp: f64, consistent: bool) -> EdgeMatrix {
    let rb = r * (b0 - b1).abs();
    if consistent {
        let p = dp * rb / 3.0;
        let s = ds * rb / 3.0;
        EdgeMatrix::Consistent([p, p / 2.0, s, s / 2.0, p / 2.0, p, s / 2.0, s])
    } else {
        let p = dp * rb / 2.0;
        let s = ds * rb / 2.0;
        EdgeMatrix::TwoPoint([p, s, p, s])
    }
}

/// Stiffness-like dashpots on the bottom edge
///
/// On the bottom edge the compressive impedance acts on the vertical DOF
/// and the shear impedance on the radial DOF.
///
/// # Arguments
/// * `b` - Vertical coordinate of the bottom edge
/// * `r0`, `r1` - Radii of the two edge nodes
/// * `ds` - Shear impedance term, vs^2 * rho / 2
/// * `dp` - Compressive impedance term, vp^2 * rho / 2
pub fn bottom_inf_stiffness(
    b: f64,
    r0: f64,
    r1: f64,
    ds: f64,
    dp: f64,
    consistent: bool,
) -> EdgeMatrix {
    let r01 = (r1 - r0).abs();
    if consistent {
        let sqrt3 = 3.0f64.sqrt();
        let fac1 = (36.0 * b * b + (r0 * (sqrt3 + 3.0) - r1 * (sqrt3 - 3.0)).powi(2)).sqrt();
        let fac2 = (36.0 * b * b + (r0 * (sqrt3 - 3.0) - r1 * (sqrt3 + 3.0)).powi(2)).sqrt();
        let near = (((9.0 + 5.0 * sqrt3) * r0 + (3.0 + sqrt3) * r1) / fac1
            + ((9.0 - 5.0 * sqrt3) * r0 + (3.0 - sqrt3) * r1) / fac2)
            / 12.0;
        let cross = (((3.0 - sqrt3) * r0 + (3.0 + sqrt3) * r1) / fac2
            + ((3.0 + sqrt3) * r0 + (3.0 - sqrt3) * r1) / fac1)
            / 12.0;
        let far = (((3.0 + sqrt3) * r0 + (9.0 + 5.0 * sqrt3) * r1) / fac2
            - ((sqrt3 - 3.0) * r0 + (5.0 * sqrt3 - 9.0) * r1) / fac1)
            / 12.0;
        EdgeMatrix::Consistent([
            ds * r01 * near,
            ds * r01 * cross,
            dp * r01 * near,
            dp * r01 * cross,
            ds * r01 * cross,
            ds * r01 * far,
            dp * r01 * cross,
            dp * r01 * far,
        ])
    } else {
        let len0 = (b * b + r0 * r0).sqrt();
        let len1 = (b * b + r1 * r1).sqrt();
        EdgeMatrix::TwoPoint([
            ds * r0 * r01 / (2.0 * len0),
            dp * r0 * r01 / (2.0 * len0),
            ds * r1 * r01 / (2.0 * len1),
            dp * r1 * r01 / (2.0 * len1),
        ])
    }
}

/// Viscous radiation dashpots on the bottom edge
pub fn bottom_inf_damping(r0: f64, r1: f64, ds: f64, dp: f64, consistent: bool) -> EdgeMatrix {
    let half = (r1 - r0).abs() / 2.0;
    if consistent {
        EdgeMatrix::Consistent([
            ds * half * (3.0 * r0 + r1) / 6.0,
            ds * half * (r0 + r1) / 6.0,
            dp * half * (3.0 * r0 + r1) / 6.0,
            dp * half * (r0 + r1) / 6.0,
            ds * half * (r0 + r1) / 6.0,
            ds * half * (r0 + 3.0 * r1) / 6.0,
            dp * half * (r0 + r1) / 6.0,
            dp * half * (r0 + 3.0 * r1) / 6.0,
        ])
    } else {
        EdgeMatrix::TwoPoint([ds * r0 * half, dp * r0 * half, ds * r1 * half, dp * r1 * half])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::SMatrix;

    /// Material matrix for axisymmetric elasticity
    fn material_matrix(e: f64, nu: f64) -> SMatrix<f64, 4, 4> {
        let fac = e / ((1.0 + nu) * (1.0 - 2.0 * nu));
        let d = fac * (1.0 - nu);
        let o = fac * nu;
        let g = fac * (1.0 - 2.0 * nu) / 2.0;
        nalgebra::matrix![
            d, o, o, 0.0;
            o, d, o, 0.0;
            o, o, d, 0.0;
            0.0, 0.0, 0.0, g;
        ]
    }

    /// Numerically integrates B^T D B r over the element with 2x2 Gauss
    /// quadrature of the bilinear formulation
    fn gauss_stiffness(r0: f64, r1: f64, b: f64, e: f64, nu: f64) -> SMatrix<f64, 8, 8> {
        let d = material_matrix(e, nu);
        let gp = 1.0 / 3.0f64.sqrt();
        // local corners in BL, BR, TR, TL order
        let xi_i = [-1.0, 1.0, 1.0, -1.0];
        let eta_i = [-1.0, -1.0, 1.0, 1.0];
        let det_j = (r1 - r0) * b / 4.0;

        let mut k = SMatrix::<f64, 8, 8>::zeros();
        for &xi in &[-gp, gp] {
            for &eta in &[-gp, gp] {
                let r = (r0 + r1) / 2.0 + xi * (r1 - r0) / 2.0;
                let mut bmat = SMatrix::<f64, 4, 8>::zeros();
                for i in 0..4 {
                    let n = 0.25 * (1.0 + xi * xi_i[i]) * (1.0 + eta * eta_i[i]);
                    let dn_dr = 0.25 * xi_i[i] * (1.0 + eta * eta_i[i]) * 2.0 / (r1 - r0);
                    let dn_dz = 0.25 * eta_i[i] * (1.0 + xi * xi_i[i]) * 2.0 / b;
                    bmat[(0, 2 * i)] = dn_dr;
                    bmat[(1, 2 * i)] = n / r;
                    bmat[(2, 2 * i + 1)] = dn_dz;
                    bmat[(3, 2 * i)] = dn_dz;
                    bmat[(3, 2 * i + 1)] = dn_dr;
                }
                k += bmat.transpose() * d * bmat * r * det_j;
            }
        }
        k
    }

    /// Largest entry difference between the closed form and the bilinear
    /// quadrature, relative to the matrix scale
    fn quadrature_gap(r0: f64, r1: f64, b: f64, e: f64, nu: f64) -> f64 {
        let closed = stiffness(r0, r1, b, e, nu);
        let numeric = gauss_stiffness(r0, r1, b, e, nu);
        let scale = closed.amax();
        let mut gap = 0.0f64;
        for i in 0..8 {
            for j in 0..8 {
                gap = gap.max((closed[(i, j)] - numeric[(i, j)]).abs() / scale);
            }
        }
        gap
    }

    #[test]
    fn stiffness_tracks_gauss_quadrature_away_from_axis() {
        // the closed form carries the hoop strain integral as a rational
        // expression rather than the logarithmic antiderivative, so it
        // deviates from the bilinear quadrature by a margin that shrinks
        // with the radius-to-width ratio of the ring
        assert!(quadrature_gap(1.0, 1.5, 0.4, 5.0e7, 0.3) < 0.1);
        assert!(quadrature_gap(10.0, 10.5, 0.8, 1.0e8, 0.25) < 0.06);
        assert!(quadrature_gap(3.0, 3.7, 0.2, 2.0e7, 0.45) < 0.3);

        // the gap narrows as the ring moves away from the axis
        assert!(
            quadrature_gap(10.0, 10.5, 0.4, 5.0e7, 0.3)
                < quadrature_gap(1.0, 1.5, 0.4, 5.0e7, 0.3)
        );

        // the element touching the axis stays the same order of magnitude
        assert!(quadrature_gap(0.0, 0.5, 0.4, 5.0e7, 0.3) < 0.8);
    }

    #[test]
    fn stiffness_is_symmetric() {
        let k = stiffness(2.0, 2.6, 0.5, 5.0e7, 0.35);
        for i in 0..8 {
            for j in 0..8 {
                assert_relative_eq!(k[(i, j)], k[(j, i)], max_relative = 1e-12);
            }
        }
    }

    #[test]
    fn consistent_mass_is_symmetric() {
        let ElementMass::Consistent(m) = mass(1.0, 1.5, 0.4, 1800.0, MassVariant::ConsistentExact)
        else {
            panic!("expected consistent mass");
        };
        for i in 0..4 {
            for j in 0..4 {
                assert_eq!(m[(i, j)], m[(j, i)]);
            }
        }
    }

    #[test]
    fn lumped_mass_is_row_sum_of_consistent() {
        let (r0, r1, b, rho) = (1.0, 1.6, 0.5, 1800.0);
        let ElementMass::Consistent(consistent) =
            mass(r0, r1, b, rho, MassVariant::ConsistentExact)
        else {
            panic!("expected consistent mass");
        };
        let ElementMass::Lumped(lumped) = mass(r0, r1, b, rho, MassVariant::LumpedExact) else {
            panic!("expected lumped mass");
        };

        for node in 0..4 {
            let row_sum: f64 = (0..4).map(|j| consistent[(node, j)]).sum();
            assert_relative_eq!(lumped[2 * node], row_sum, max_relative = 1e-12);
            assert_relative_eq!(lumped[2 * node + 1], row_sum, max_relative = 1e-12);
        }
    }

    #[test]
    fn one_point_lumped_is_row_sum_of_one_point_consistent() {
        let (r0, r1, b, rho) = (2.0, 2.4, 0.3, 2000.0);
        let ElementMass::Consistent(consistent) =
            mass(r0, r1, b, rho, MassVariant::ConsistentOnePoint)
        else {
            panic!("expected consistent mass");
        };
        let ElementMass::Lumped(lumped) = mass(r0, r1, b, rho, MassVariant::LumpedOnePoint) else {
            panic!("expected lumped mass");
        };
        let row_sum: f64 = (0..4).map(|j| consistent[(0, j)]).sum();
        assert_relative_eq!(lumped[0], row_sum, max_relative = 1e-12);
    }

    #[test]
    fn lumped_mass_preserves_total_ring_mass() {
        let (r0, r1, b, rho) = (1.0, 1.6, 0.5, 1800.0);
        let ElementMass::Lumped(lumped) = mass(r0, r1, b, rho, MassVariant::LumpedExact) else {
            panic!("expected lumped mass");
        };
        // mass per radian and per direction
        let expected = rho * b * (r1 * r1 - r0 * r0) / 2.0;
        let radial: f64 = (0..4).map(|n| lumped[2 * n]).sum();
        assert_relative_eq!(radial, expected, max_relative = 1e-12);
    }

    #[test]
    fn consistent_edge_damping_preserves_two_point_total() {
        // both distributions spread the same total impedance over the edge
        let (r, b0, b1, ds, dp) = (50.0, -2.0, -2.5, 1800.0 * 100.0, 1800.0 * 190.0);
        let consistent = side_inf_damping(r, b0, b1, ds, dp, true);
        let two_point = side_inf_damping(r, b0, b1, ds, dp, false);

        let sum = |m: &EdgeMatrix| m.entries().iter().map(|(_, _, v)| v).sum::<f64>();
        assert_relative_eq!(sum(&consistent), sum(&two_point), max_relative = 1e-12);
    }
}
