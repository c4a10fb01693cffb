use crate::errors::{EosError, EosResult};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Level of detail in the iteration output.
#[derive(Copy, Clone, Debug, PartialOrd, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Do not print output.
    #[default]
    None,
    /// Print information about the success or failure of the iteration.
    Result,
    /// Print a detailed output for every iteration.
    Iter,
}

/// Cooperative cancellation of long running iterations.
///
/// A calculation is cancelled either if the shared flag is set
/// or if the deadline has passed. The check happens at the start
/// of every iteration of every solver.
#[derive(Clone, Default)]
pub struct Cancellation {
    flag: Option<Arc<AtomicBool>>,
    deadline: Option<Instant>,
}

impl Cancellation {
    /// Cancel as soon as `flag` is set to `true`.
    pub fn from_flag(flag: Arc<AtomicBool>) -> Self {
        Self {
            flag: Some(flag),
            deadline: None,
        }
    }

    /// Cancel once the given duration has elapsed.
    pub fn from_timeout(timeout: Duration) -> Self {
        Self {
            flag: None,
            deadline: Some(Instant::now() + timeout),
        }
    }

    /// Add a deadline to an existing cancellation.
    pub fn deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag
            .as_ref()
            .map_or(false, |f| f.load(Ordering::Relaxed))
            || self.deadline.map_or(false, |d| Instant::now() >= d)
    }

    /// Return [EosError::Cancelled] if the calculation should be aborted.
    pub fn check(&self) -> EosResult<()> {
        if self.is_cancelled() {
            Err(EosError::Cancelled)
        } else {
            Ok(())
        }
    }
}

impl fmt::Debug for Cancellation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cancellation")
            .field("flag", &self.flag.as_ref().map(|f| f.load(Ordering::Relaxed)))
            .field("deadline", &self.deadline)
            .finish()
    }
}

/// Options for the various phase equilibria solvers.
///
/// If the values are [None], solver specific default
/// values are used.
#[derive(Clone, Debug, Default)]
pub struct SolverOptions {
    /// Maximum number of iterations.
    pub max_iter: Option<usize>,
    /// Tolerance.
    pub tol: Option<f64>,
    /// Iteration output indicated by the [Verbosity] enum.
    pub verbosity: Verbosity,
    /// Optional cancellation checked once per iteration.
    pub cancel: Option<Cancellation>,
}

impl From<(Option<usize>, Option<f64>, Option<Verbosity>)> for SolverOptions {
    fn from(options: (Option<usize>, Option<f64>, Option<Verbosity>)) -> Self {
        Self {
            max_iter: options.0,
            tol: options.1,
            verbosity: options.2.unwrap_or(Verbosity::None),
            cancel: None,
        }
    }
}

impl SolverOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = Some(max_iter);
        self
    }

    pub fn tol(mut self, tol: f64) -> Self {
        self.tol = Some(tol);
        self
    }

    pub fn verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    pub fn cancel(mut self, cancel: Cancellation) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn unwrap_or(&self, max_iter: usize, tol: f64) -> (usize, f64, Verbosity) {
        (
            self.max_iter.unwrap_or(max_iter),
            self.tol.unwrap_or(tol),
            self.verbosity,
        )
    }

    /// Abort with [EosError::Cancelled] if a cancellation was requested.
    pub fn check_cancelled(&self) -> EosResult<()> {
        self.cancel.as_ref().map_or(Ok(()), Cancellation::check)
    }

    /// Copy of the options that only keeps verbosity and cancellation.
    ///
    /// Used to pass options on to nested solvers that have their own defaults.
    pub fn inherit(&self) -> Self {
        Self {
            max_iter: None,
            tol: None,
            verbosity: self.verbosity,
            cancel: self.cancel.clone(),
        }
    }
}
