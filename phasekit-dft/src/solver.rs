use ndarray::prelude::*;
use num_dual::linalg::{norm, LU};
use phasekit_core::{log_iter, log_result, Cancellation, EosError, EosResult, Verbosity};
use std::collections::VecDeque;
use std::fmt;

const DEFAULT_PARAMS_PICARD: SolverParameter = SolverParameter {
    solver: DFTAlgorithm::PicardIteration(1.0),
    log: false,
    max_iter: 500,
    tol: 1e-11,
    beta: 0.15,
};
const DEFAULT_PARAMS_PICARD_LOG: SolverParameter = SolverParameter {
    solver: DFTAlgorithm::PicardIteration(1.0),
    log: true,
    max_iter: 50,
    tol: 1e-5,
    beta: 0.15,
};
const DEFAULT_PARAMS_ANDERSON: SolverParameter = SolverParameter {
    solver: DFTAlgorithm::AndersonMixing(100),
    log: false,
    max_iter: 150,
    tol: 1e-11,
    beta: 0.15,
};

#[derive(Clone, Copy, Debug)]
struct SolverParameter {
    solver: DFTAlgorithm,
    log: bool,
    max_iter: usize,
    tol: f64,
    beta: f64,
}

#[derive(Clone, Copy)]
enum DFTAlgorithm {
    PicardIteration(f64),
    AndersonMixing(usize),
}

/// State of a (stage of a) DFT iteration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SolverState {
    Iterating,
    Converged,
    Failed,
}

/// Settings for the DFT solver.
///
/// The solver consists of a list of stages that are executed one
/// after another, each continuing from the result of the previous one.
/// A stage that does not converge within its iteration limit hands
/// over to the next stage. If a stage fails after an earlier one
/// converged, the solution of the converged stage is kept.
#[derive(Clone, Debug)]
pub struct DFTSolver {
    parameters: Vec<SolverParameter>,
    pub verbosity: Verbosity,
    pub cancel: Option<Cancellation>,
}

impl Default for DFTSolver {
    fn default() -> Self {
        Self {
            parameters: vec![DEFAULT_PARAMS_PICARD_LOG, DEFAULT_PARAMS_ANDERSON],
            verbosity: Verbosity::None,
            cancel: None,
        }
    }
}

impl DFTSolver {
    /// Create a new empty `DFTSolver` object.
    pub fn new(verbosity: Verbosity) -> Self {
        Self {
            parameters: Vec::new(),
            verbosity,
            cancel: None,
        }
    }

    /// Add a Picard iteration to the solver.
    pub fn picard_iteration(mut self, max_rel: Option<f64>) -> Self {
        let mut algorithm = DEFAULT_PARAMS_PICARD;
        if let Some(max_rel) = max_rel {
            algorithm.solver = DFTAlgorithm::PicardIteration(max_rel);
        }
        self.parameters.push(algorithm);
        self
    }

    /// Add Anderson mixing to the solver.
    pub fn anderson_mixing(mut self, mmax: Option<usize>) -> Self {
        let mut algorithm = DEFAULT_PARAMS_ANDERSON;
        if let Some(mmax) = mmax {
            algorithm.solver = DFTAlgorithm::AndersonMixing(mmax);
        }
        self.parameters.push(algorithm);
        self
    }

    fn update_last(mut self, update: impl FnOnce(&mut SolverParameter)) -> Self {
        if let Some(parameter) = self.parameters.last_mut() {
            update(parameter);
        }
        self
    }

    /// Iterate the logarithm of the density profile in the last solver.
    pub fn log(self) -> Self {
        self.update_last(|p| p.log = true)
    }

    /// Set the maximum number of iterations for the last solver.
    pub fn max_iter(self, max_iter: usize) -> Self {
        self.update_last(|p| p.max_iter = max_iter)
    }

    /// Set the tolerance for the last solver.
    pub fn tol(self, tol: f64) -> Self {
        self.update_last(|p| p.tol = tol)
    }

    /// Set the damping factor for the last solver
    pub fn beta(self, beta: f64) -> Self {
        self.update_last(|p| p.beta = beta)
    }

    pub fn verbose(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Abort the iteration once the cancellation is triggered.
    pub fn cancel(mut self, cancel: Cancellation) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Run all stages and return the final state, the total number of
    /// iterations and the last residual norm.
    pub(crate) fn solve<F>(
        &self,
        x: &mut Array1<f64>,
        residual: &mut F,
    ) -> EosResult<(SolverState, usize, f64)>
    where
        F: FnMut(&Array1<f64>, ArrayViewMut1<f64>, bool) -> EosResult<()>,
    {
        log_iter!(self.verbosity, "solver               | iter | residual ");
        let mut state = SolverState::Iterating;
        let mut iterations = 0;
        let mut res = f64::INFINITY;
        let mut converged: Option<(Array1<f64>, f64)> = None;
        for algorithm in &self.parameters {
            let (s, i, r) = match algorithm.solve(x, residual, self.verbosity, self.cancel.as_ref()) {
                Ok(result) => result,
                Err(EosError::IterationFailed(_)) if converged.is_some() => {
                    (SolverState::Failed, 0, f64::NAN)
                }
                Err(e) => return Err(e),
            };
            iterations += i;
            if s == SolverState::Converged {
                converged = Some((x.clone(), r));
                (state, res) = (s, r);
            } else if let Some((x_converged, r_converged)) = &converged {
                log_result!(
                    self.verbosity,
                    "DFT solver: {} failed, continuing from the last converged stage",
                    algorithm
                );
                x.assign(x_converged);
                (state, res) = (SolverState::Converged, *r_converged);
            } else {
                (state, res) = (s, r);
            }
        }
        match state {
            SolverState::Converged => log_result!(
                self.verbosity,
                "DFT solver: converged in {} step(s)\n",
                iterations
            ),
            _ => log_result!(
                self.verbosity,
                "DFT solver: not converged after {} step(s) (residual {:e})\n",
                iterations,
                res
            ),
        }
        Ok((state, iterations, res))
    }
}

fn rms(res: &Array1<f64>) -> f64 {
    norm(res) / (res.len() as f64).sqrt()
}

fn check_cancelled(cancel: Option<&Cancellation>) -> EosResult<()> {
    cancel.map_or(Ok(()), Cancellation::check)
}

impl SolverParameter {
    fn solve<F>(
        &self,
        x: &mut Array1<f64>,
        residual: &mut F,
        verbosity: Verbosity,
        cancel: Option<&Cancellation>,
    ) -> EosResult<(SolverState, usize, f64)>
    where
        F: FnMut(&Array1<f64>, ArrayViewMut1<f64>, bool) -> EosResult<()>,
    {
        match self.solver {
            DFTAlgorithm::PicardIteration(max_rel) => {
                self.solve_picard(max_rel, x, residual, verbosity, cancel)
            }
            DFTAlgorithm::AndersonMixing(mmax) => {
                self.solve_anderson(mmax, x, residual, verbosity, cancel)
            }
        }
    }

    fn next_state(&self, k: usize, res: f64, converged: bool) -> SolverState {
        if converged {
            SolverState::Converged
        } else if k >= self.max_iter {
            SolverState::Failed
        } else {
            SolverState::Iterating
        }
        .check_residual(res)
    }

    fn solve_picard<F>(
        &self,
        max_rel: f64,
        x: &mut Array1<f64>,
        residual: &mut F,
        verbosity: Verbosity,
        cancel: Option<&Cancellation>,
    ) -> EosResult<(SolverState, usize, f64)>
    where
        F: FnMut(&Array1<f64>, ArrayViewMut1<f64>, bool) -> EosResult<()>,
    {
        log_iter!(verbosity, "{:-<43}", "");
        let mut resm = Array::zeros(x.raw_dim());
        let mut state = SolverState::Iterating;
        let mut k = 0;
        let mut res = f64::INFINITY;

        while state == SolverState::Iterating {
            check_cancelled(cancel)?;
            k += 1;

            // calculate residual
            residual(x, resm.view_mut(), self.log)?;

            // limit the relative change of every element
            let mut beta_min: Option<f64> = None;
            let beta = Zip::from(&*x).and(&resm).map_collect(|&x, &r| {
                let beta = (max_rel * x / r).abs();
                if beta < self.beta {
                    beta_min = Some(beta_min.map_or(beta, |b| b.min(beta)));
                    beta
                } else {
                    self.beta
                }
            });

            // update solution
            if self.log {
                *x *= &(&resm * &beta).mapv(|r| (-r).exp());
            } else {
                *x -= &(&resm * &beta);
            }

            res = rms(&resm);
            log_iter!(
                verbosity,
                "Picard iteration {:3} | {:>4} | {:.6e} | {}",
                if self.log { "log" } else { "" },
                k,
                res,
                beta_min.unwrap_or(self.beta)
            );
            if res.is_nan() {
                return Err(EosError::IterationFailed(String::from("Picard iteration")));
            }
            state = self.next_state(k, res, res < self.tol && beta_min.is_none());
        }
        Ok((state, k, res))
    }

    fn solve_anderson<F>(
        &self,
        mmax: usize,
        x: &mut Array1<f64>,
        residual: &mut F,
        verbosity: Verbosity,
        cancel: Option<&Cancellation>,
    ) -> EosResult<(SolverState, usize, f64)>
    where
        F: FnMut(&Array1<f64>, ArrayViewMut1<f64>, bool) -> EosResult<()>,
    {
        log_iter!(verbosity, "{:-<43}", "");
        let mmax = mmax.max(1);
        let mut resm: VecDeque<Array1<f64>> = VecDeque::with_capacity(mmax);
        let mut xm: VecDeque<Array1<f64>> = VecDeque::with_capacity(mmax);
        let mut state = SolverState::Iterating;
        let mut k = 0;
        let mut res = f64::INFINITY;

        while state == SolverState::Iterating {
            check_cancelled(cancel)?;
            k += 1;

            // drop old values
            if resm.len() == mmax {
                resm.pop_front();
                xm.pop_front();
            }
            let m = resm.len() + 1;

            // calculate residual
            let mut r_k = Array::zeros(x.raw_dim());
            residual(x, r_k.view_mut(), self.log)?;
            res = rms(&r_k);
            if res.is_nan() {
                return Err(EosError::IterationFailed(String::from("Anderson mixing")));
            }
            resm.push_back(r_k);

            // save x value
            if self.log {
                xm.push_back(x.mapv(f64::ln));
            } else {
                xm.push_back(x.clone());
            }

            // calculate the mixing coefficients
            let r = Array::from_shape_fn((m + 1, m + 1), |(i, j)| match (i == m, j == m) {
                (false, false) => (&resm[i] * &resm[j]).sum(),
                (true, true) => 0.0,
                _ => 1.0,
            });
            let mut alpha = Array::zeros(m + 1);
            alpha[m] = 1.0;
            let alpha = LU::new(r)?.solve(&alpha);

            // update solution
            x.fill(0.0);
            for i in 0..m {
                *x += &((&xm[i] - &(&resm[i] * self.beta)) * alpha[i]);
            }
            if self.log {
                x.mapv_inplace(f64::exp);
            } else {
                x.mapv_inplace(f64::abs);
            }

            log_iter!(
                verbosity,
                "Anderson mixing {:3}  | {:>4} | {:.6e} ",
                if self.log { "log" } else { "" },
                k,
                res
            );
            state = self.next_state(k, res, res < self.tol);
        }
        Ok((state, k, res))
    }
}

impl SolverState {
    fn check_residual(self, res: f64) -> Self {
        if res.is_finite() {
            self
        } else {
            Self::Failed
        }
    }
}

impl fmt::Display for DFTAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::PicardIteration(max_rel) => write!(f, "Picard iteration (max_rel={})", max_rel),
            Self::AndersonMixing(mmax) => write!(f, "Anderson mixing (mmax={})", mmax),
        }
    }
}

impl fmt::Debug for DFTAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::PicardIteration(_) => write!(f, "Picard iteration"),
            Self::AndersonMixing(_) => write!(f, "Anderson mixing"),
        }
    }
}

impl fmt::Display for SolverParameter {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}{} max_iter: {}, tol: {}, beta: {}",
            self.solver,
            if self.log { " (log)" } else { "" },
            self.max_iter,
            self.tol,
            self.beta
        )
    }
}

impl fmt::Display for DFTSolver {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for algorithm in &self.parameters {
            writeln!(f, "{algorithm}")?;
        }
        Ok(())
    }
}
