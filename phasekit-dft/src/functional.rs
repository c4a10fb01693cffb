use crate::convolver::{BulkConvolver, Convolver};
use crate::functional_contribution::FunctionalContribution;
use crate::ideal_chain_contribution::IdealChainContribution;
use crate::weight_functions::WeightFunctionInfo;
use ndarray::*;
use num_dual::DualNum;
use phasekit_core::{EosResult, Residual, StateHD};
use std::borrow::Cow;
use std::sync::Arc;

/// Different representations for molecules within DFT.
pub enum MoleculeShape<'a> {
    /// For spherical molecules, the number of components.
    Spherical(usize),
    /// For non-spherical molecules in a homosegmented approach, the
    /// chain length parameter $m$.
    NonSpherical(&'a Array1<f64>),
}

/// A general Helmholtz energy functional.
///
/// Every functional is also a bulk model. The [Residual] implementation
/// has to agree with the bulk limit of the functional, which is most
/// easily achieved by calling [HelmholtzEnergyFunctional::evaluate_bulk].
/// Otherwise the bulk phases used as boundary conditions are not
/// solutions of the Euler-Lagrange equation.
pub trait HelmholtzEnergyFunctional: Residual + Sized {
    type Contribution<'a>: FunctionalContribution
    where
        Self: 'a;

    /// Return the individual contributions of the functional.
    fn contributions<'a>(&'a self) -> Vec<Self::Contribution<'a>>;

    /// Return the shape of the molecules and the necessary specifications.
    fn molecule_shape(&self) -> MoleculeShape<'_>;

    fn weight_functions(&self, temperature: f64) -> Vec<WeightFunctionInfo<f64>> {
        self.contributions()
            .into_iter()
            .map(|c| c.weight_functions(temperature))
            .collect()
    }

    fn m(&self) -> Cow<'_, Array1<f64>> {
        match self.molecule_shape() {
            MoleculeShape::Spherical(n) => Cow::Owned(Array1::ones(n)),
            MoleculeShape::NonSpherical(m) => Cow::Borrowed(m),
        }
    }

    fn ideal_chain_contribution(&self) -> IdealChainContribution {
        IdealChainContribution::new(&self.m())
    }

    /// Reduced residual Helmholtz energy of a homogeneous state, split into contributions.
    fn evaluate_bulk<D: DualNum<f64> + Copy>(&self, state: &StateHD<D>) -> Vec<(String, D)> {
        let mut res: Vec<(String, D)> = self
            .contributions()
            .into_iter()
            .map(|c| (c.name().to_string(), c.helmholtz_energy(state)))
            .collect();
        let ideal_chain = self.ideal_chain_contribution();
        res.push((
            ideal_chain.name(),
            ideal_chain.bulk_helmholtz_energy_density(&state.partial_density) * state.volume,
        ));
        res
    }

    /// Calculate the residual Helmholtz energy density $\beta f$ and
    /// the (residual) intrinsic functional derivative $\frac{\delta\beta\mathcal{F}}{\delta\rho_i(z)}$.
    fn functional_derivative(
        &self,
        temperature: f64,
        density: &Array2<f64>,
        convolver: &Arc<dyn Convolver<f64>>,
    ) -> EosResult<(Array1<f64>, Array2<f64>)> {
        let weighted_densities = convolver.weighted_densities(density);
        let contributions = self.contributions();
        let mut partial_derivatives = Vec::with_capacity(contributions.len());
        let mut helmholtz_energy_density = Array1::zeros(density.ncols());
        for (c, wd) in contributions.into_iter().zip(weighted_densities) {
            let mut phi = Array1::zeros(density.ncols());
            let mut pd = Array2::zeros(wd.raw_dim());
            c.first_partial_derivatives(temperature, wd.view(), phi.view_mut(), pd.view_mut())?;
            partial_derivatives.push(pd);
            helmholtz_energy_density += &phi;
        }
        Ok((
            helmholtz_energy_density,
            convolver.functional_derivative(&partial_derivatives),
        ))
    }

    /// Functional derivative of a homogeneous system with the given partial densities.
    fn bulk_functional_derivative(
        &self,
        temperature: f64,
        partial_density: &Array1<f64>,
    ) -> EosResult<Array1<f64>> {
        let convolver = BulkConvolver::new(self.weight_functions(temperature));
        let density = partial_density.clone().insert_axis(Axis(1));
        let (_, dfdrho) = self.functional_derivative(temperature, &density, &convolver)?;
        Ok(dfdrho.index_axis_move(Axis(1), 0))
    }

    /// Calculate the grand potential density $\omega$ in K/Å³.
    ///
    /// The expression assumes that `density` satisfies the
    /// Euler-Lagrange equation.
    fn grand_potential_density(
        &self,
        temperature: f64,
        density: &Array2<f64>,
        convolver: &Arc<dyn Convolver<f64>>,
    ) -> EosResult<Array1<f64>> {
        let (mut f, dfdrho) = self.functional_derivative(temperature, density, convolver)?;
        for ((rho, dfdrho), &m) in density
            .outer_iter()
            .zip(dfdrho.outer_iter())
            .zip(self.m().iter())
        {
            f -= &((&dfdrho + m) * &rho);
        }
        Ok(f * temperature)
    }
}
