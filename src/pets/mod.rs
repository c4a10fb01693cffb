//! Perturbed truncated and shifted (PeTS) equation of state and
//! Helmholtz energy functional for Lennard-Jones fluids.
#[cfg(feature = "dft")]
mod dft;
mod eos;
mod parameters;

#[cfg(feature = "dft")]
pub use dft::{AttractiveFunctional, PetsFunctionalContribution};
pub use eos::{Pets, PetsOptions};
pub use parameters::{PetsBinaryRecord, PetsParameters, PetsRecord};
