use crate::parameter::ParameterError;
use num_dual::linalg::LinAlgError;
use thiserror::Error;

/// Error type for improperly defined states and convergence problems.
#[derive(Error, Debug)]
pub enum EosError {
    #[error("{0}")]
    Error(String),
    #[error("`{solver}` did not converge within {iterations} iterations (last residual: {residual:e}).")]
    NoConvergence {
        solver: String,
        iterations: usize,
        residual: f64,
    },
    #[error("No physical {phase} root at T = {temperature} K and p = {pressure:e} K/Å³.")]
    NoPhysicalRoot {
        phase: String,
        temperature: f64,
        pressure: f64,
    },
    #[error("Invalid bulk state: {0}.")]
    InvalidBulkState(String),
    #[error("Non-physical input: {name} = {value}.")]
    NonPhysicalInput { name: String, value: f64 },
    #[error("`{0}` encountered illegal values during the iteration.")]
    IterationFailed(String),
    #[error("Iteration resulted in trivial solution.")]
    TrivialSolution,
    #[error("Equation of state is initialized for {0} components while the input specifies {1} components.")]
    IncompatibleComponents(usize, usize),
    #[error("System is supercritical.")]
    SuperCritical,
    #[error("Invalid grid: {0}.")]
    InvalidGrid(String),
    #[error("Calculation was cancelled.")]
    Cancelled,
    #[error(transparent)]
    ParameterError(#[from] ParameterError),
    #[error(transparent)]
    LinAlgError(#[from] LinAlgError),
    #[cfg(feature = "rayon")]
    #[error(transparent)]
    RayonError(#[from] rayon::ThreadPoolBuildError),
}

impl EosError {
    /// Shorthand for [EosError::NoConvergence].
    pub fn no_convergence(solver: &str, iterations: usize, residual: f64) -> Self {
        Self::NoConvergence {
            solver: solver.to_owned(),
            iterations,
            residual,
        }
    }
}

/// Convenience type for `Result<T, EosError>`.
pub type EosResult<T> = Result<T, EosError>;
