//! Bounded Nelder–Mead local search, single start and multi-start.
//!
//! argmin's Nelder–Mead is unconstrained, so bounds are enforced by
//! projection: the minimizer sees
//!
//! `cost(x) = score(clip(x)) · (1 + d²) + d²`
//!
//! where `d` is the width-normalized distance of `x` outside the box. The
//! objective itself only ever sees `clip(x)`, and reported parameters are
//! always clipped.

use argmin::core::{CostFunction, Error, Executor, State, TerminationReason, TerminationStatus};
use argmin::solver::neldermead::NelderMead;
use rayon::prelude::*;

use crate::domain::Bounds;
use crate::error::SirError;
use crate::fit::objective::Objective;

/// Knobs for one Nelder–Mead run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalSearchOptions {
    pub max_iters: u64,
    /// Converged once the simplex's cost standard deviation falls below this.
    pub sd_tolerance: f64,
    /// Initial simplex edge length as a fraction of each bound width.
    pub simplex_fraction: f64,
}

impl Default for LocalSearchOptions {
    fn default() -> Self {
        Self {
            max_iters: 1000,
            sd_tolerance: 1e-8,
            simplex_fraction: 0.05,
        }
    }
}

/// Result of one local search.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalOutcome {
    pub params: Vec<f64>,
    pub score: f64,
    pub converged: bool,
    pub iterations: u64,
    pub message: String,
}

/// Best of several local searches.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiStartOutcome {
    pub best: LocalOutcome,
    pub best_index: usize,
    pub starts: usize,
    /// How many starts reported convergence.
    pub converged_starts: usize,
}

struct BoundedCost<'a, O: Objective + ?Sized> {
    objective: &'a O,
    bounds: &'a Bounds,
}

impl<O: Objective + ?Sized> CostFunction for BoundedCost<'_, O> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, x: &Self::Param) -> Result<Self::Output, Error> {
        let d = self.bounds.normalized_excess(x);
        let clipped = self.bounds.clip(x);
        let score = self.objective.score(&clipped).map_err(Error::new)?;
        let d2 = d * d;
        Ok(score * (1.0 + d2) + d2)
    }
}

/// Vertices of the starting simplex: `start` plus one step along each axis.
///
/// Steps go toward the interior when a forward step would leave the box.
fn initial_simplex(start: &[f64], bounds: &Bounds, fraction: f64) -> Vec<Vec<f64>> {
    let mut vertices = Vec::with_capacity(start.len() + 1);
    vertices.push(start.to_vec());
    for i in 0..start.len() {
        let delta = fraction * bounds.width(i);
        let mut v = start.to_vec();
        v[i] = if start[i] + delta <= bounds.upper()[i] {
            start[i] + delta
        } else {
            start[i] - delta
        };
        vertices.push(v);
    }
    vertices
}

fn recover_error(err: Error) -> SirError {
    match err.downcast_ref::<SirError>() {
        Some(e) => e.clone(),
        None => SirError::LocalSearch(err.to_string()),
    }
}

/// Run bounded Nelder–Mead from `start`.
pub fn minimize_from<O: Objective + ?Sized>(
    objective: &O,
    bounds: &Bounds,
    start: &[f64],
    opts: &LocalSearchOptions,
) -> Result<LocalOutcome, SirError> {
    if start.len() != bounds.dim() {
        return Err(SirError::DimensionMismatch {
            expected: bounds.dim(),
            found: start.len(),
        });
    }
    let start = bounds.clip(start);
    let simplex = initial_simplex(&start, bounds, opts.simplex_fraction);

    // NelderMead::init unwraps the cost of every starting vertex, so objective
    // errors on the initial simplex have to surface here.
    for vertex in &simplex {
        objective.score(&bounds.clip(vertex))?;
    }

    let solver: NelderMead<Vec<f64>, f64> = NelderMead::new(simplex)
        .with_sd_tolerance(opts.sd_tolerance)
        .map_err(recover_error)?;
    let cost = BoundedCost { objective, bounds };
    let max_iters = opts.max_iters;
    let res = Executor::new(cost, solver)
        .configure(|state| state.max_iters(max_iters))
        .run()
        .map_err(recover_error)?;

    let state = res.state();
    let best = state.get_best_param().cloned().unwrap_or(start);
    let params = bounds.clip(&best);
    let score = objective.score(&params)?;
    let status = state.get_termination_status();
    let converged = matches!(
        status,
        TerminationStatus::Terminated(TerminationReason::SolverConverged)
    );

    Ok(LocalOutcome {
        params,
        score,
        converged,
        iterations: state.get_iter(),
        message: status.to_string(),
    })
}

/// Run `minimize_from` for every start in parallel and keep the best.
///
/// The winner is the minimum score with ties broken by start index, so the
/// result does not depend on thread scheduling.
pub fn multi_start<O: Objective + ?Sized>(
    objective: &O,
    bounds: &Bounds,
    starts: &[Vec<f64>],
    opts: &LocalSearchOptions,
) -> Result<MultiStartOutcome, SirError> {
    if starts.is_empty() {
        return Err(SirError::InvalidConfig(
            "multi-start search needs at least one start".to_string(),
        ));
    }

    let outcomes = starts
        .par_iter()
        .enumerate()
        .map(|(idx, s)| minimize_from(objective, bounds, s, opts).map(|o| (idx, o)))
        .collect::<Result<Vec<_>, SirError>>()?;

    let converged_starts = outcomes.iter().filter(|(_, o)| o.converged).count();
    let mut best = &outcomes[0];
    for c in &outcomes[1..] {
        if c.1.score < best.1.score || (c.1.score == best.1.score && c.0 < best.0) {
            best = c;
        }
    }

    Ok(MultiStartOutcome {
        best: best.1.clone(),
        best_index: best.0,
        starts: starts.len(),
        converged_starts,
    })
}
