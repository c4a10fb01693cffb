#![warn(clippy::all)]
#![allow(clippy::suspicious_operation_groupings)]
#![allow(clippy::too_many_arguments)]

mod convolver;
mod functional;
mod functional_contribution;
mod geometry;
mod ideal_chain_contribution;
pub mod interface;
mod profile;
mod solver;
mod weight_functions;

pub use convolver::{BulkConvolver, Convolver, ConvolverFFT};
pub use functional::{HelmholtzEnergyFunctional, MoleculeShape};
pub use functional_contribution::FunctionalContribution;
pub use geometry::Axis;
pub use ideal_chain_contribution::IdealChainContribution;
pub use interface::{solve_density_profile, GridSpec, PlanarInterface, SurfaceTensionDiagram};
pub use profile::{DFTProfile, DFTSpecification};
pub use solver::{DFTSolver, SolverState};
pub use weight_functions::{WeightFunction, WeightFunctionInfo, WeightFunctionShape};
