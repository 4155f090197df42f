//! Seeded differential evolution (`best1bin`) over a bounded box.
//!
//! - Latin-hypercube initial population of `multiplier × dim` members (at least 5)
//! - per-generation dithered mutation factor drawn from `mutation`
//! - binomial crossover with one guaranteed mutated coordinate
//! - trial coordinates that leave the box are resampled uniformly inside it
//!
//! All random draws for a generation happen sequentially on one seeded RNG.
//! Trials are then scored in parallel and selection runs only after every
//! trial has a score, so the result is identical for any thread count.

use log::{debug, info};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use crate::domain::Bounds;
use crate::error::SirError;
use crate::fit::local::{LocalSearchOptions, minimize_from};
use crate::fit::objective::{INFEASIBLE_SCORE, Objective};

/// Smallest population regardless of dimension.
pub const MIN_POPULATION: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvolutionOptions {
    pub population_multiplier: usize,
    pub max_generations: usize,
    /// Dither range for the mutation factor.
    pub mutation: (f64, f64),
    /// Crossover probability.
    pub recombination: f64,
    /// Relative convergence tolerance on population energies.
    pub tol: f64,
    /// Absolute convergence tolerance on population energies. `fit_model`
    /// raises it to a small fraction of the data scale.
    pub atol: f64,
    pub seed: u64,
    /// Run a local search from the best member at the end.
    pub polish: bool,
    pub local: LocalSearchOptions,
}

impl Default for EvolutionOptions {
    fn default() -> Self {
        Self {
            population_multiplier: 15,
            max_generations: 200,
            mutation: (0.5, 1.0),
            recombination: 0.7,
            tol: 0.01,
            atol: 0.0,
            seed: 42,
            polish: true,
            local: LocalSearchOptions::default(),
        }
    }
}

impl EvolutionOptions {
    fn validate(&self) -> Result<(), SirError> {
        let (lo, hi) = self.mutation;
        if !(lo.is_finite() && hi.is_finite() && lo >= 0.0 && lo <= hi && hi <= 2.0) {
            return Err(SirError::InvalidConfig(format!(
                "mutation range must satisfy 0 <= min <= max <= 2 (got ({lo}, {hi}))"
            )));
        }
        if !(0.0..=1.0).contains(&self.recombination) {
            return Err(SirError::InvalidConfig(format!(
                "recombination must be in [0, 1] (got {})",
                self.recombination
            )));
        }
        if !(self.tol.is_finite() && self.tol >= 0.0 && self.atol.is_finite() && self.atol >= 0.0)
        {
            return Err(SirError::InvalidConfig(
                "convergence tolerances must be finite and >= 0".to_string(),
            ));
        }
        if self.population_multiplier == 0 {
            return Err(SirError::InvalidConfig(
                "population multiplier must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EvolutionOutcome {
    pub params: Vec<f64>,
    pub score: f64,
    pub converged: bool,
    pub generations: usize,
    /// Whether the polish step improved on the best member.
    pub polished: bool,
    pub message: String,
}

/// Latin-hypercube sample of `n` points in `bounds`: each axis is cut into `n`
/// strata and every stratum is hit exactly once.
fn latin_hypercube(bounds: &Bounds, n: usize, rng: &mut StdRng) -> Vec<Vec<f64>> {
    let dim = bounds.dim();
    let mut pop = vec![vec![0.0; dim]; n];
    let seg = 1.0 / n as f64;
    for j in 0..dim {
        let mut strata: Vec<usize> = (0..n).collect();
        strata.shuffle(rng);
        for (i, member) in pop.iter_mut().enumerate() {
            let u = (strata[i] as f64 + rng.gen_range(0.0..1.0)) * seg;
            member[j] = bounds.lower()[j] + u * bounds.width(j);
        }
    }
    pop
}

/// Two distinct member indices, both different from `exclude`.
fn pick_pair(n: usize, exclude: usize, rng: &mut StdRng) -> (usize, usize) {
    let mut a = rng.gen_range(0..n);
    while a == exclude {
        a = rng.gen_range(0..n);
    }
    let mut b = rng.gen_range(0..n);
    while b == exclude || b == a {
        b = rng.gen_range(0..n);
    }
    (a, b)
}

fn score_all<O: Objective + ?Sized>(objective: &O, members: &[Vec<f64>]) -> Result<Vec<f64>, SirError> {
    members.par_iter().map(|m| objective.score(m)).collect()
}

fn best_index(energies: &[f64]) -> usize {
    let mut best = 0;
    for (i, &e) in energies.iter().enumerate().skip(1) {
        if e < energies[best] {
            best = i;
        }
    }
    best
}

fn mean_std(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
    (mean, var.sqrt())
}

/// Minimize `objective` over `bounds` with differential evolution.
pub fn differential_evolution<O: Objective + ?Sized>(
    objective: &O,
    bounds: &Bounds,
    opts: &EvolutionOptions,
) -> Result<EvolutionOutcome, SirError> {
    opts.validate()?;
    if objective.dim() != bounds.dim() {
        return Err(SirError::DimensionMismatch {
            expected: objective.dim(),
            found: bounds.dim(),
        });
    }

    let dim = bounds.dim();
    let n = (opts.population_multiplier * dim).max(MIN_POPULATION);
    let mut rng = StdRng::seed_from_u64(opts.seed);

    let mut population = latin_hypercube(bounds, n, &mut rng);
    let mut energies = score_all(objective, &population)?;
    let mut best = best_index(&energies);

    info!(
        "differential evolution: {n} members, {dim} parameters, up to {} generations (seed {})",
        opts.max_generations, opts.seed
    );

    let (f_lo, f_hi) = opts.mutation;
    let mut converged = false;
    let mut generations = 0;
    while generations < opts.max_generations {
        let f = if f_hi > f_lo {
            rng.gen_range(f_lo..f_hi)
        } else {
            f_lo
        };

        let mut trials = Vec::with_capacity(n);
        for i in 0..n {
            let (r0, r1) = pick_pair(n, i, &mut rng);
            let fill = rng.gen_range(0..dim);
            let mut trial = population[i].clone();
            for j in 0..dim {
                if j == fill || rng.gen_range(0.0..1.0) < opts.recombination {
                    trial[j] = population[best][j] + f * (population[r0][j] - population[r1][j]);
                }
            }
            for j in 0..dim {
                if !(trial[j] >= bounds.lower()[j] && trial[j] <= bounds.upper()[j]) {
                    trial[j] = bounds.lower()[j] + rng.gen_range(0.0..1.0) * bounds.width(j);
                }
            }
            trials.push(trial);
        }

        let trial_energies = score_all(objective, &trials)?;
        for (i, (trial, e)) in trials.into_iter().zip(trial_energies).enumerate() {
            if e <= energies[i] {
                population[i] = trial;
                energies[i] = e;
            }
        }
        best = best_index(&energies);
        generations += 1;

        let (mean, std) = mean_std(&energies);
        debug!(
            "generation {generations}: best={:.6e} mean={mean:.6e} std={std:.3e}",
            energies[best]
        );
        if energies[best] < INFEASIBLE_SCORE && std <= opts.atol + opts.tol * mean.abs() {
            converged = true;
            break;
        }
    }

    let mut params = population[best].clone();
    let mut score = energies[best];
    let mut message = if converged {
        format!("population converged after {generations} generations")
    } else {
        format!("reached the generation cap ({generations}) without converging")
    };

    let mut polished = false;
    if opts.polish {
        let local = minimize_from(objective, bounds, &params, &opts.local)?;
        if local.score < score {
            debug!("polish improved score {score:.6e} -> {:.6e}", local.score);
            params = local.params;
            score = local.score;
            polished = true;
            message.push_str("; polished");
        }
    }

    Ok(EvolutionOutcome {
        params,
        score,
        converged,
        generations,
        polished,
        message,
    })
}
