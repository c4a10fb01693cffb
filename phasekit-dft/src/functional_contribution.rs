use crate::weight_functions::WeightFunctionInfo;
use ndarray::prelude::*;
use num_dual::*;
use phasekit_core::{EosResult, StateHD};

/// Individual functional contribution that can be evaluated using generalized (hyper) dual numbers.
pub trait FunctionalContribution: Sync + Send {
    /// Return the name of the contribution.
    fn name(&self) -> &'static str;

    /// Return the weight functions required in this contribution.
    fn weight_functions<N: DualNum<f64> + Copy>(&self, temperature: N) -> WeightFunctionInfo<N>;

    /// Return the Helmholtz energy density for the given temperature and weighted densities.
    fn helmholtz_energy_density<N: DualNum<f64> + Copy>(
        &self,
        temperature: N,
        weighted_densities: ArrayView2<N>,
    ) -> EosResult<Array1<N>>;

    /// Reduced Helmholtz energy of a homogeneous system.
    ///
    /// Returns NaN if the Helmholtz energy density can not be evaluated
    /// for the bulk weighted densities.
    fn helmholtz_energy<N: DualNum<f64> + Copy>(&self, state: &StateHD<N>) -> N {
        let weight_functions = self.weight_functions(state.temperature);

        let density = weight_functions
            .component_index
            .mapv(|c| state.partial_density[c]);

        let weight_constants = weight_functions.weight_constants(N::zero(), 0);
        let weighted_densities = Array2::from_shape_fn((weight_constants.nrows(), 1), |(i, _)| {
            weight_constants
                .row(i)
                .iter()
                .zip(density.iter())
                .fold(N::zero(), |acc, (&w, &rho)| acc + w * rho)
        });
        self.helmholtz_energy_density(state.temperature, weighted_densities.view())
            .map_or(N::from(f64::NAN), |phi| phi[0] * state.volume)
    }

    /// Helmholtz energy density and its partial derivatives w.r.t. all weighted densities.
    fn first_partial_derivatives(
        &self,
        temperature: f64,
        weighted_densities: ArrayView2<f64>,
        mut helmholtz_energy_density: ArrayViewMut1<f64>,
        mut first_partial_derivative: ArrayViewMut2<f64>,
    ) -> EosResult<()> {
        let mut wd = weighted_densities.mapv(Dual64::from);
        let t = Dual64::from(temperature);
        let mut phi = Array::zeros(weighted_densities.ncols());

        for i in 0..wd.nrows() {
            wd.row_mut(i).map_inplace(|x| x.eps = 1.0);
            phi = self.helmholtz_energy_density(t, wd.view())?;
            first_partial_derivative
                .row_mut(i)
                .assign(&phi.mapv(|p| p.eps));
            wd.row_mut(i).map_inplace(|x| x.eps = 0.0);
        }
        helmholtz_energy_density.assign(&phi.mapv(|p| p.re));
        Ok(())
    }
}
