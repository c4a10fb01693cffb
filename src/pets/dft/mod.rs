use super::eos::Pets;
use super::parameters::PetsParameters;
use crate::hard_sphere::FMTContribution;
use phasekit_derive::FunctionalContribution;
use phasekit_dft::{HelmholtzEnergyFunctional, MoleculeShape};

mod dispersion;
pub use dispersion::AttractiveFunctional;

/// Individual contributions of the PeTS Helmholtz energy functional.
#[derive(FunctionalContribution)]
pub enum PetsFunctionalContribution<'a> {
    Fmt(FMTContribution<'a, PetsParameters>),
    Attractive(AttractiveFunctional<'a>),
}

impl HelmholtzEnergyFunctional for Pets {
    type Contribution<'a> = PetsFunctionalContribution<'a>;

    fn contributions<'a>(&'a self) -> Vec<PetsFunctionalContribution<'a>> {
        let p = &*self.parameters;
        vec![
            FMTContribution::new(p, self.options.fmt_version).into(),
            AttractiveFunctional::new(p).into(),
        ]
    }

    fn molecule_shape(&self) -> MoleculeShape<'_> {
        MoleculeShape::Spherical(self.parameters.sigma.len())
    }
}
