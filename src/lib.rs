//! Equations of state, phase equilibria and classical density
//! functional theory for planar fluid interfaces.
//!
//! The solvers live in [phasekit_core] and (with the `dft` feature)
//! [phasekit_dft]. This crate provides the model implementations.
#![warn(clippy::all)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::many_single_char_names)]

pub mod hard_sphere;

// models
#[cfg(feature = "pets")]
pub mod pets;

mod eos;
pub use eos::ResidualModel;
