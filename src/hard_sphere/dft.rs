use super::{HardSphereProperties, MonomerShape};
use ndarray::*;
use num_dual::DualNum;
use phasekit_core::{Components, EosResult, Residual, StateHD};
use phasekit_derive::FunctionalContribution;
use phasekit_dft::{
    FunctionalContribution, HelmholtzEnergyFunctional, MoleculeShape, WeightFunction,
    WeightFunctionInfo, WeightFunctionShape,
};
use std::f64::consts::PI;

const PI36M1: f64 = 1.0 / (36.0 * PI);
const N3_CUTOFF: f64 = 1e-5;

/// Different versions of fundamental measure theory.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FMTVersion {
    /// White Bear ([Roth et al., 2002](https://doi.org/10.1088/0953-8984/14/46/313)) or modified ([Yu and Wu, 2002](https://doi.org/10.1063/1.1520530)) fundamental measure theory
    #[default]
    WhiteBear,
    /// Anti-symmetric White Bear fundamental measure theory ([Rosenfeld et al., 1997](https://doi.org/10.1103/PhysRevE.55.4245))
    AntiSymWhiteBear,
}

/// The [FunctionalContribution] for the hard sphere functional.
///
/// The Helmholtz energy density is calculated according to
/// $$\beta f=-n_0\ln\left(1-n_3\right)+\frac{n_{12}}{1-n_3}+\frac{1}{36\pi}n_2n_{22}f_3(n_3)$$
///
/// |[FMTVersion]|$n_{12}$|$n_{22}$|
/// |-|:-:|:-:|
/// |WhiteBear|$n_1n_2-\vec n_1\cdot\vec n_2$|$n_2^2-3\vec n_2\cdot\vec n_2$|
/// |AntiSymWhiteBear|$n_1n_2-\vec n_1\cdot\vec n_2$|$n_2^2\left(1-\frac{\vec n_2\cdot\vec n_2}{n_2^2}\right)^3$|
///
/// Below $n_3=10^{-5}$, $f_3$ is replaced by its Taylor expansion.
///
/// For a single component only $n_2$, $n_3$ and $\vec n_2$ are
/// convolved, the remaining weighted densities are proportional to them.
pub struct FMTContribution<'a, P> {
    pub properties: &'a P,
    version: FMTVersion,
}

impl<'a, P> FMTContribution<'a, P> {
    pub fn new(properties: &'a P, version: FMTVersion) -> Self {
        Self {
            properties,
            version,
        }
    }
}

impl<'a, P: HardSphereProperties> FMTContribution<'a, P> {
    fn is_pure(&self) -> bool {
        self.properties.component_index().len() == 1
    }
}

impl<'a, P: HardSphereProperties + Sync + Send> FunctionalContribution for FMTContribution<'a, P> {
    fn name(&self) -> &'static str {
        match self.version {
            FMTVersion::WhiteBear => "Hard sphere (WB)",
            FMTVersion::AntiSymWhiteBear => "Hard sphere (AntiSymWB)",
        }
    }

    fn weight_functions<N: DualNum<f64> + Copy>(&self, temperature: N) -> WeightFunctionInfo<N> {
        let r = self.properties.hs_diameter(temperature).mapv(|d| d * 0.5);
        let c = self.properties.geometry_coefficients().mapv(N::from);
        let info = WeightFunctionInfo::new(self.properties.component_index(), false);
        let weight_function = |prefactor: Array1<N>, shape| WeightFunction {
            prefactor,
            kernel_radius: r.clone(),
            shape,
        };
        if self.is_pure() {
            return info.extend(
                vec![
                    weight_function(c.clone(), WeightFunctionShape::Delta),
                    weight_function(c.clone(), WeightFunctionShape::Theta),
                    weight_function(c, WeightFunctionShape::DeltaVec),
                ],
                false,
            );
        }
        let c_r2 = Zip::from(&c)
            .and(&r)
            .map_collect(|&c, &r| c / (r * r * (4.0 * PI)));
        let c_r = Zip::from(&c)
            .and(&r)
            .map_collect(|&c, &r| c / (r * (4.0 * PI)));
        info.extend(
            vec![
                weight_function(c_r2, WeightFunctionShape::Delta),
                weight_function(c_r.clone(), WeightFunctionShape::Delta),
                weight_function(c.clone(), WeightFunctionShape::Delta),
                weight_function(c.clone(), WeightFunctionShape::Theta),
                weight_function(c_r, WeightFunctionShape::DeltaVec),
                weight_function(c, WeightFunctionShape::DeltaVec),
            ],
            true,
        )
    }

    fn helmholtz_energy_density<N: DualNum<f64> + Copy>(
        &self,
        temperature: N,
        weighted_densities: ArrayView2<N>,
    ) -> EosResult<Array1<N>> {
        let pure = self.is_pure();

        // scalar weighted densities
        let (n2, n3) = if pure {
            (weighted_densities.row(0), weighted_densities.row(1))
        } else {
            (weighted_densities.row(2), weighted_densities.row(3))
        };
        let (n0, n1) = if pure {
            let r = self.properties.hs_diameter(temperature)[0] * 0.5;
            (
                n2.mapv(|n2| n2 / (r * r * 4.0 * PI)),
                n2.mapv(|n2| n2 / (r * 4.0 * PI)),
            )
        } else {
            (weighted_densities.row(0).to_owned(), weighted_densities.row(1).to_owned())
        };

        // vector weighted densities (absent for bulk systems)
        let (n1v, n2v) = if pure {
            let r = self.properties.hs_diameter(temperature)[0] * 0.5;
            let n2v = weighted_densities.slice(s![2.., ..]);
            (n2v.mapv(|n2v| n2v / (r * 4.0 * PI)), n2v)
        } else {
            let dim = (weighted_densities.nrows() - 4) / 2;
            (
                weighted_densities.slice(s![4..4 + dim, ..]).to_owned(),
                weighted_densities.slice(s![4 + dim..4 + 2 * dim, ..]),
            )
        };
        let n1n2 = &n1 * &n2 - (&n1v * &n2v).sum_axis(Axis(0));
        let n2v2 = (&n2v * &n2v).sum_axis(Axis(0));
        let n2n2 = match self.version {
            FMTVersion::WhiteBear => &n2 * &n2 - n2v2.mapv(|x| x * 3.0),
            FMTVersion::AntiSymWhiteBear => Zip::from(&n2).and(&n2v2).map_collect(|&n2, &v2| {
                let xi2 = v2 / (n2 * n2);
                let xi2 = if xi2.re() > 1.0 { N::one() } else { xi2 };
                n2 * n2 * (-xi2 + 1.0).powi(3)
            }),
        };

        // auxiliary variables
        let ln31 = n3.mapv(|n3| (-n3).ln_1p());
        let n3m1rec = n3.mapv(|n3| (-n3 + 1.0).recip());

        // Taylor expansion of f3 at low densities
        let f3 = n3.mapv(|n3| {
            if n3.re() < N3_CUTOFF {
                (((n3 * 35.0 / 6.0 + 4.8) * n3 + 3.75) * n3 + 8.0 / 3.0) * n3 + 1.5
            } else {
                let n3m1 = -n3 + 1.0;
                (n3m1 * n3m1 * (-n3).ln_1p() + n3) / (n3 * n3 * n3m1 * n3m1)
            }
        });
        Ok(-(&n0 * &ln31) + n1n2 * &n3m1rec + (n2n2 * n2 * f3).mapv(|x| x * PI36M1))
    }
}

pub struct HardSphereParameters {
    sigma: Array1<f64>,
}

impl HardSphereProperties for HardSphereParameters {
    fn monomer_shape(&self) -> MonomerShape<'_> {
        MonomerShape::Spherical(self.sigma.len())
    }

    fn hs_diameter<N: DualNum<f64> + Copy>(&self, _: N) -> Array1<N> {
        self.sigma.mapv(N::from)
    }
}

#[derive(FunctionalContribution)]
pub enum FMTFunctionalContribution<'a> {
    Fmt(FMTContribution<'a, HardSphereParameters>),
}

/// [HelmholtzEnergyFunctional] for hard sphere systems.
pub struct FMTFunctional {
    properties: HardSphereParameters,
    version: FMTVersion,
}

impl FMTFunctional {
    pub fn new(sigma: &Array1<f64>, version: FMTVersion) -> Self {
        Self {
            properties: HardSphereParameters {
                sigma: sigma.clone(),
            },
            version,
        }
    }
}

impl Components for FMTFunctional {
    fn components(&self) -> usize {
        self.properties.sigma.len()
    }

    fn subset(&self, component_list: &[usize]) -> Self {
        let sigma = component_list
            .iter()
            .map(|&c| self.properties.sigma[c])
            .collect();
        Self::new(&sigma, self.version)
    }
}

impl Residual for FMTFunctional {
    fn compute_max_density(&self, moles: &Array1<f64>) -> f64 {
        moles.sum() / (moles * &self.properties.sigma.mapv(|s| s.powi(3))).sum() * 1.2
    }

    fn residual_helmholtz_energy_contributions<D: DualNum<f64> + Copy>(
        &self,
        state: &StateHD<D>,
    ) -> Vec<(String, D)> {
        self.evaluate_bulk(state)
    }
}

impl HelmholtzEnergyFunctional for FMTFunctional {
    type Contribution<'a> = FMTFunctionalContribution<'a>;

    fn contributions<'a>(&'a self) -> Vec<FMTFunctionalContribution<'a>> {
        vec![FMTContribution::new(&self.properties, self.version).into()]
    }

    fn molecule_shape(&self) -> MoleculeShape<'_> {
        MoleculeShape::Spherical(self.properties.sigma.len())
    }
}
