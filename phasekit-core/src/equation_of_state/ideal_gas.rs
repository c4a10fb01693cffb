use crate::state::StateHD;
use num_dual::DualNum;

/// Reduced ideal gas Helmholtz energy $\beta A^\mathrm{ig}=\sum_iN_i\left(\ln\rho_i-1\right)$.
///
/// The thermal de Broglie wavelength is set to 1 Å. The constant
/// cancels in every phase equilibrium condition. Components that
/// are absent from the state do not contribute.
pub fn ideal_gas_helmholtz_energy<D: DualNum<f64> + Copy>(state: &StateHD<D>) -> D {
    state
        .moles
        .iter()
        .zip(state.partial_density.iter())
        .filter(|(n, _)| n.re() > 0.0)
        .fold(D::zero(), |acc, (&n, &rho)| acc + n * (rho.ln() - 1.0))
}
