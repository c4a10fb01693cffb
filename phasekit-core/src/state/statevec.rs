use super::{Contributions, State};
use crate::equation_of_state::Residual;
use ndarray::{Array1, Array2};
use std::iter::FromIterator;
use std::ops::Deref;

/// A list of states for a simple access to properties
/// of multiple states.
pub struct StateVec<'a, E>(pub Vec<&'a State<E>>);

impl<'a, E> FromIterator<&'a State<E>> for StateVec<'a, E> {
    fn from_iter<I: IntoIterator<Item = &'a State<E>>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a, E> IntoIterator for StateVec<'a, E> {
    type Item = &'a State<E>;
    type IntoIter = std::vec::IntoIter<Self::Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a, E> Deref for StateVec<'a, E> {
    type Target = Vec<&'a State<E>>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<'a, E: Residual> StateVec<'a, E> {
    pub fn temperature(&self) -> Array1<f64> {
        self.0.iter().map(|s| s.temperature).collect()
    }

    pub fn pressure(&self) -> Array1<f64> {
        self.0
            .iter()
            .map(|s| s.pressure(Contributions::Total))
            .collect()
    }

    pub fn compressibility(&self) -> Array1<f64> {
        self.0
            .iter()
            .map(|s| s.compressibility(Contributions::Total))
            .collect()
    }

    pub fn density(&self) -> Array1<f64> {
        self.0.iter().map(|s| s.density).collect()
    }

    /// Mole fractions with one row per state.
    ///
    /// Returns an empty array if the list is empty.
    pub fn molefracs(&self) -> Array2<f64> {
        let n = self.0.first().map_or(0, |s| s.eos.components());
        Array2::from_shape_fn((self.0.len(), n), |(i, j)| self.0[i].molefracs[j])
    }

    /// Residual Helmholtz energy per particle.
    pub fn residual_molar_helmholtz_energy(&self) -> Array1<f64> {
        self.0
            .iter()
            .map(|s| s.residual_molar_helmholtz_energy())
            .collect()
    }
}
