//! Closed-form body wave velocities for an isotropic elastic material.
//!
//! Validity of the Poisson ratio (-1 < nu < 0.5) is enforced at
//! configuration load time; these routines assume it holds.

/// Computes the shear (S) wave velocity
///
/// # Arguments
/// * `e` - Young's modulus [N/m^2]
/// * `nu` - Poisson ratio [-]
/// * `rho` - Mass density [kg/m^3]
///
/// # Returns
/// The shear wave velocity [m/s]
pub fn s_wave_velocity(e: f64, nu: f64, rho: f64) -> f64 {
    (e / (2.0 * (1.0 + nu) * rho)).sqrt()
}

/// Computes the compressive (P) wave velocity
///
/// # Arguments
/// * `e` - Young's modulus [N/m^2]
/// * `nu` - Poisson ratio [-]
/// * `rho` - Mass density [kg/m^3]
///
/// # Returns
/// The compressive wave velocity [m/s]
pub fn p_wave_velocity(e: f64, nu: f64, rho: f64) -> f64 {
    (e * (1.0 - nu) / ((1.0 + nu) * (1.0 - 2.0 * nu) * rho)).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn shear_velocity_matches_shear_modulus_form() {
        // vs = sqrt(G/rho) with G = E/2(1+nu)
        let (e, nu, rho) = (5.0e7, 0.3, 1800.0);
        let g = e / (2.0 * (1.0 + nu));
        assert_relative_eq!(
            s_wave_velocity(e, nu, rho),
            (g / rho).sqrt(),
            max_relative = 1e-12
        );
    }

    #[test]
    fn p_wave_faster_than_s_wave() {
        let (e, nu, rho) = (5.0e7, 0.3, 1800.0);
        assert!(p_wave_velocity(e, nu, rho) > s_wave_velocity(e, nu, rho));
    }

    #[test]
    fn incompressible_limit_diverges() {
        let vp_near = p_wave_velocity(5.0e7, 0.499, 1800.0);
        let vp_far = p_wave_velocity(5.0e7, 0.4, 1800.0);
        assert!(vp_near > 5.0 * vp_far);
    }
}
