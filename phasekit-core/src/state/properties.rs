use super::{Contributions, Derivative::*, State, StateHD};
use crate::equation_of_state::{ideal_gas_helmholtz_energy, Residual};
use crate::state::Derivative;
use ndarray::{Array1, Array2};
use num_dual::DualNum;

/// # State properties
///
/// Energies are in K (i.e., divided by the Boltzmann constant), pressures in K/Å³.
impl<E: Residual> State<E> {
    fn evaluate<D: DualNum<f64> + Copy>(&self, state: &StateHD<D>, contributions: Contributions) -> D {
        let a = match contributions {
            Contributions::IdealGas => ideal_gas_helmholtz_energy(state),
            Contributions::Residual => self.eos.residual_helmholtz_energy(state),
            Contributions::Total => {
                ideal_gas_helmholtz_energy(state) + self.eos.residual_helmholtz_energy(state)
            }
        };
        a * state.temperature
    }

    fn first(&self, derivative: Derivative, contributions: Contributions) -> f64 {
        self.evaluate(&self.derive1(derivative), contributions).eps
    }

    fn second(&self, derivative: Derivative, contributions: Contributions) -> f64 {
        self.evaluate(&self.derive2(derivative), contributions).v2
    }

    fn second_mixed(
        &self,
        derivative1: Derivative,
        derivative2: Derivative,
        contributions: Contributions,
    ) -> f64 {
        self.evaluate(&self.derive2_mixed(derivative1, derivative2), contributions)
            .eps1eps2
    }

    fn third(&self, derivative: Derivative, contributions: Contributions) -> f64 {
        self.evaluate(&self.derive3(derivative), contributions).v3
    }

    /// Helmholtz energy: $A$
    pub fn helmholtz_energy(&self, contributions: Contributions) -> f64 {
        self.evaluate(&self.derive0(), contributions)
    }

    /// Residual Helmholtz energy per particle: $a^\text{res}=\frac{A^\text{res}}{N}$
    pub fn residual_molar_helmholtz_energy(&self) -> f64 {
        self.helmholtz_energy(Contributions::Residual) / self.total_moles
    }

    /// Residual Helmholtz energy of the individual model contributions.
    pub fn residual_helmholtz_energy_contributions(&self) -> Vec<(String, f64)> {
        let state = self.derive0();
        self.eos
            .residual_helmholtz_energy_contributions(&state)
            .into_iter()
            .map(|(name, a)| (name, a * self.temperature))
            .collect()
    }

    /// Pressure: $p=-\left(\frac{\partial A}{\partial V}\right)_{T,N_i}$
    pub fn pressure(&self, contributions: Contributions) -> f64 {
        -self.first(DV, contributions)
    }

    /// Compressibility factor: $Z=\frac{pV}{Nk_BT}$
    pub fn compressibility(&self, contributions: Contributions) -> f64 {
        self.pressure(contributions) / (self.density * self.temperature)
    }

    /// Partial derivative of pressure w.r.t. volume: $\left(\frac{\partial p}{\partial V}\right)_{T,N_i}$
    pub fn dp_dv(&self, contributions: Contributions) -> f64 {
        -self.second(DV, contributions)
    }

    /// Second partial derivative of pressure w.r.t. volume: $\left(\frac{\partial^2 p}{\partial V^2}\right)_{T,N_i}$
    pub fn d2p_dv2(&self, contributions: Contributions) -> f64 {
        -self.third(DV, contributions)
    }

    /// Partial derivative of pressure w.r.t. temperature: $\left(\frac{\partial p}{\partial T}\right)_{V,N_i}$
    pub fn dp_dt(&self, contributions: Contributions) -> f64 {
        -self.second_mixed(DV, DT, contributions)
    }

    /// Partial derivative of pressure w.r.t. moles: $\left(\frac{\partial p}{\partial N_i}\right)_{T,V,N_j}$
    pub fn dp_dni(&self, contributions: Contributions) -> Array1<f64> {
        Array1::from_shape_fn(self.eos.components(), |i| {
            -self.second_mixed(DV, DN(i), contributions)
        })
    }

    /// Partial derivative of pressure w.r.t. density: $\left(\frac{\partial p}{\partial \rho}\right)_{T,N_i}$
    pub fn dp_drho(&self) -> f64 {
        -self.volume / self.density * self.dp_dv(Contributions::Total)
    }

    /// Second partial derivative of pressure w.r.t. density: $\left(\frac{\partial^2 p}{\partial \rho^2}\right)_{T,N_i}$
    pub fn d2p_drho2(&self) -> f64 {
        self.volume / (self.density * self.density)
            * (2.0 * self.dp_dv(Contributions::Total)
                + self.volume * self.d2p_dv2(Contributions::Total))
    }

    /// Pressure and its derivative w.r.t. density.
    pub(crate) fn p_dpdrho(&self) -> (f64, f64) {
        (self.pressure(Contributions::Total), self.dp_drho())
    }

    /// Pressure and its first and second derivatives w.r.t. density.
    pub(crate) fn d2pdrho2(&self) -> (f64, f64, f64) {
        (
            self.pressure(Contributions::Total),
            self.dp_drho(),
            self.d2p_drho2(),
        )
    }

    /// Chemical potential: $\mu_i=\left(\frac{\partial A}{\partial N_i}\right)_{T,V,N_j}$
    pub fn chemical_potential(&self, contributions: Contributions) -> Array1<f64> {
        Array1::from_shape_fn(self.eos.components(), |i| self.first(DN(i), contributions))
    }

    /// Residual chemical potential: $\mu_i^\text{res}=\left(\frac{\partial A^\text{res}}{\partial N_i}\right)_{T,V,N_j}$
    pub fn residual_chemical_potential(&self) -> Array1<f64> {
        self.chemical_potential(Contributions::Residual)
    }

    /// Partial derivative of chemical potential w.r.t. moles: $\left(\frac{\partial\mu_i}{\partial N_j}\right)_{T,V,N_k}$
    pub fn dmu_dni(&self, contributions: Contributions) -> Array2<f64> {
        let n = self.eos.components();
        Array2::from_shape_fn((n, n), |(i, j)| {
            self.second_mixed(DN(i), DN(j), contributions)
        })
    }

    /// Logarithm of the fugacity coefficient: $\ln\varphi_i=\frac{\mu_i^\mathrm{res}}{k_BT}-\ln Z$
    pub fn ln_phi(&self) -> Array1<f64> {
        self.residual_chemical_potential() / self.temperature
            - self.compressibility(Contributions::Total).ln()
    }

    /// Fugacity: $f_i=x_i\varphi_ip=\rho_ik_BT\exp\left(\frac{\mu_i^\mathrm{res}}{k_BT}\right)$
    pub fn fugacity(&self) -> Array1<f64> {
        &self.partial_density
            * self.temperature
            * self
                .residual_chemical_potential()
                .mapv(|mu| (mu / self.temperature).exp())
    }

    /// Partial molar volume: $v_i=\left(\frac{\partial V}{\partial N_i}\right)_{T,p,N_j}$
    pub fn partial_molar_volume(&self) -> Array1<f64> {
        -self.dp_dni(Contributions::Total) / self.dp_dv(Contributions::Total)
    }

    /// Partial derivative of the logarithm of the fugacity coefficient w.r.t. pressure: $\left(\frac{\partial\ln\varphi_i}{\partial p}\right)_{T,N_i}$
    pub fn dln_phi_dp(&self) -> Array1<f64> {
        self.partial_molar_volume() / self.temperature
            - 1.0 / self.pressure(Contributions::Total)
    }

    /// Entropy: $S=-\left(\frac{\partial A}{\partial T}\right)_{V,N_i}$
    pub fn entropy(&self, contributions: Contributions) -> f64 {
        -self.first(DT, contributions)
    }

    /// Residual entropy per particle: $s^\text{res}=\frac{S^\text{res}}{N}$
    pub fn residual_molar_entropy(&self) -> f64 {
        self.entropy(Contributions::Residual) / self.total_moles
    }

    /// Enthalpy: $H=A+TS+pV$
    pub fn enthalpy(&self, contributions: Contributions) -> f64 {
        self.helmholtz_energy(contributions)
            + self.temperature * self.entropy(contributions)
            + self.pressure(contributions) * self.volume
    }

    /// Gibbs energy: $G=A+pV$
    pub fn gibbs_energy(&self, contributions: Contributions) -> f64 {
        self.helmholtz_energy(contributions) + self.pressure(contributions) * self.volume
    }

    /// Residual Gibbs energy at given temperature and pressure:
    /// $G^\text{res}=A^\text{res}+pV-Nk_BT-Nk_BT\ln Z$
    pub fn residual_gibbs_energy(&self) -> f64 {
        let z = self.compressibility(Contributions::Total);
        self.helmholtz_energy(Contributions::Residual)
            + self.pressure(Contributions::Total) * self.volume
            - self.total_moles * self.temperature * (1.0 + z.ln())
    }

    /// Molar volume: $v=\frac{V}{N}$
    pub fn molar_volume(&self) -> f64 {
        self.volume / self.total_moles
    }
}
