//! Parameter samplers for the walk-forward optimiser.
//!
//! The [`Sampler`] port is the swap point for the search algorithm: the
//! driver only ever proposes points, reports scalar scores back, and asks
//! for the best so far. [`TpeSampler`] is the default; [`RandomSampler`]
//! exists for tests and as a baseline.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::strategy::{ParamDomain, ParamValue, Params, SearchSpace};

/// One observed optimisation trial.
#[derive(Debug, Clone, PartialEq)]
pub struct Trial {
    /// Parameters the trial ran with
    pub params: Params,
    /// Objective value; `None` marks a failed or penalised-to-worst trial
    pub score: Option<f64>,
}

/// Sequential model-based optimiser port.
///
/// The contract is propose / observe / best: the driver calls
/// [`suggest`](Self::suggest) for a parameter point, evaluates it, then
/// reports the score with [`observe`](Self::observe). `None` scores are the
/// worst possible outcome. Under a fixed seed and a well-defined
/// (propose, observe) sequence the sampler is fully deterministic.
pub trait Sampler: Send {
    /// Propose the next parameter point.
    fn suggest(&mut self, space: &SearchSpace) -> Params;

    /// Report the objective for a proposed point.
    fn observe(&mut self, params: &Params, score: Option<f64>);

    /// Best scored point so far, if any trial succeeded.
    fn best(&self) -> Option<(&Params, f64)>;

    /// All trials observed so far, in order.
    fn trials(&self) -> &[Trial];
}

/// Draw a uniform value from a parameter domain.
fn sample_domain(rng: &mut StdRng, domain: &ParamDomain) -> ParamValue {
    match domain {
        ParamDomain::IntRange { lo, hi } => ParamValue::Int(rng.gen_range(*lo..=*hi)),
        ParamDomain::FloatRange { lo, hi, step: None } => {
            ParamValue::Float(rng.gen_range(*lo..=*hi))
        }
        ParamDomain::FloatRange { lo, hi, step: Some(step) } => {
            let steps = ((hi - lo) / step).round() as i64;
            let k = rng.gen_range(0..=steps.max(0));
            ParamValue::Float((lo + k as f64 * step).min(*hi))
        }
        ParamDomain::Choice(values) => values[rng.gen_range(0..values.len())].clone(),
    }
}

/// Snap a numeric value back into its domain.
fn clamp_to_domain(value: f64, domain: &ParamDomain) -> ParamValue {
    match domain {
        ParamDomain::IntRange { lo, hi } => {
            ParamValue::Int((value.round() as i64).clamp(*lo, *hi))
        }
        ParamDomain::FloatRange { lo, hi, step } => {
            let v = value.clamp(*lo, *hi);
            let v = match step {
                Some(s) if *s > 0.0 => (lo + ((v - lo) / s).round() * s).min(*hi),
                _ => v,
            };
            ParamValue::Float(v)
        }
        // Not meaningful for categorical domains; callers handle those apart
        ParamDomain::Choice(values) => values[0].clone(),
    }
}

fn record(trials: &mut Vec<Trial>, best: &mut Option<(Params, f64)>, params: &Params, score: Option<f64>) {
    trials.push(Trial {
        params: params.clone(),
        score,
    });
    if let Some(s) = score
        && s.is_finite()
        && best.as_ref().is_none_or(|(_, b)| s > *b)
    {
        *best = Some((params.clone(), s));
    }
}

/// Uniform random search with a fixed seed.
#[derive(Debug)]
pub struct RandomSampler {
    rng: StdRng,
    trials: Vec<Trial>,
    best: Option<(Params, f64)>,
}

impl RandomSampler {
    /// Create a sampler from an explicit seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            trials: Vec::new(),
            best: None,
        }
    }
}

impl Sampler for RandomSampler {
    fn suggest(&mut self, space: &SearchSpace) -> Params {
        space
            .iter()
            .map(|(name, domain)| (name.clone(), sample_domain(&mut self.rng, domain)))
            .collect()
    }

    fn observe(&mut self, params: &Params, score: Option<f64>) {
        record(&mut self.trials, &mut self.best, params, score);
    }

    fn best(&self) -> Option<(&Params, f64)> {
        self.best.as_ref().map(|(p, s)| (p, *s))
    }

    fn trials(&self) -> &[Trial] {
        &self.trials
    }
}

/// Tree-structured Parzen estimator, simplified.
///
/// After `n_startup` random trials, observations are split into a "good"
/// quantile and the rest (failed trials count as bad). Candidates are drawn
/// from Gaussian kernels centred on good values and ranked by the
/// good-to-bad likelihood ratio; the best-ranked candidate is proposed.
/// Categorical dimensions use add-one-smoothed frequency ratios.
#[derive(Debug)]
pub struct TpeSampler {
    rng: StdRng,
    gamma: f64,
    n_startup: usize,
    n_candidates: usize,
    trials: Vec<Trial>,
    best: Option<(Params, f64)>,
}

impl TpeSampler {
    /// Create a sampler from an explicit seed with default settings
    /// (`gamma = 0.25`, 10 startup trials, 24 candidates per proposal).
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            gamma: 0.25,
            n_startup: 10,
            n_candidates: 24,
            trials: Vec::new(),
            best: None,
        }
    }

    /// Override the number of random startup trials.
    pub fn with_startup(mut self, n: usize) -> Self {
        self.n_startup = n;
        self
    }

    fn scored(&self) -> Vec<(&Params, f64)> {
        self.trials
            .iter()
            .filter_map(|t| t.score.map(|s| (&t.params, s)))
            .collect()
    }

}

/// Split observed params into (good, bad) by score quantile. Failed
/// trials land in the bad set. Free function (rather than a `&self`
/// method) so callers can borrow `trials` without also borrowing the
/// rest of the sampler, e.g. its RNG field.
fn split_trials(trials: &[Trial], gamma: f64) -> (Vec<&Params>, Vec<&Params>) {
    let mut scored: Vec<(&Params, f64)> = trials
        .iter()
        .filter_map(|t| t.score.map(|s| (&t.params, s)))
        .collect();
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    let n_good = ((scored.len() as f64 * gamma).ceil() as usize).max(1);
    let good: Vec<&Params> = scored[..n_good.min(scored.len())]
        .iter()
        .map(|(p, _)| *p)
        .collect();
    let mut bad: Vec<&Params> = scored[n_good.min(scored.len())..]
        .iter()
        .map(|(p, _)| *p)
        .collect();
    bad.extend(trials.iter().filter(|t| t.score.is_none()).map(|t| &t.params));
    (good, bad)
}

impl Sampler for TpeSampler {
    fn suggest(&mut self, space: &SearchSpace) -> Params {
        // At least one scored observation is needed to seed the split
        if self.scored().len() < self.n_startup.max(1) {
            return space
                .iter()
                .map(|(name, domain)| (name.clone(), sample_domain(&mut self.rng, domain)))
                .collect();
        }

        let (good, bad) = split_trials(&self.trials, self.gamma);
        let mut best_candidate: Option<(Params, f64)> = None;

        for _ in 0..self.n_candidates {
            let mut candidate = Params::new();
            let mut log_ratio = 0.0;

            for (name, domain) in space {
                match domain {
                    ParamDomain::Choice(values) => {
                        let good_counts = category_counts(&good, name, values);
                        let bad_counts = category_counts(&bad, name, values);
                        // Sample a category weighted by the good counts
                        let total: usize = good_counts.iter().map(|c| c + 1).sum();
                        let mut pick = self.rng.gen_range(0..total);
                        let mut idx = 0;
                        for (i, c) in good_counts.iter().enumerate() {
                            let w = c + 1;
                            if pick < w {
                                idx = i;
                                break;
                            }
                            pick -= w;
                        }
                        let l = (good_counts[idx] + 1) as f64 / (good.len() + values.len()) as f64;
                        let g = (bad_counts[idx] + 1) as f64 / (bad.len() + values.len()) as f64;
                        log_ratio += (l / g).ln();
                        candidate.insert(name.clone(), values[idx].clone());
                    }
                    _ => {
                        let (lo, hi) = numeric_bounds(domain);
                        let bandwidth = ((hi - lo) / 10.0).max(f64::EPSILON);
                        let good_vals = numeric_values(&good, name);
                        let bad_vals = numeric_values(&bad, name);

                        // Draw around a random good observation
                        let centre = good_vals[self.rng.gen_range(0..good_vals.len())];
                        let raw = centre + gaussian(&mut self.rng) * bandwidth;
                        let value = clamp_to_domain(raw, domain);
                        let x = value.as_float();

                        let l = kernel_density(x, &good_vals, bandwidth, lo, hi);
                        let g = kernel_density(x, &bad_vals, bandwidth, lo, hi);
                        log_ratio += (l / g).ln();
                        candidate.insert(name.clone(), value);
                    }
                }
            }

            if best_candidate
                .as_ref()
                .is_none_or(|(_, score)| log_ratio > *score)
            {
                best_candidate = Some((candidate, log_ratio));
            }
        }

        best_candidate.expect("n_candidates > 0").0
    }

    fn observe(&mut self, params: &Params, score: Option<f64>) {
        record(&mut self.trials, &mut self.best, params, score);
    }

    fn best(&self) -> Option<(&Params, f64)> {
        self.best.as_ref().map(|(p, s)| (p, *s))
    }

    fn trials(&self) -> &[Trial] {
        &self.trials
    }
}

fn numeric_bounds(domain: &ParamDomain) -> (f64, f64) {
    match domain {
        ParamDomain::IntRange { lo, hi } => (*lo as f64, *hi as f64),
        ParamDomain::FloatRange { lo, hi, .. } => (*lo, *hi),
        ParamDomain::Choice(_) => (0.0, 1.0),
    }
}

fn numeric_values(observations: &[&Params], name: &str) -> Vec<f64> {
    observations
        .iter()
        .filter_map(|p| p.get(name).map(ParamValue::as_float))
        .collect()
}

fn category_counts(observations: &[&Params], name: &str, values: &[ParamValue]) -> Vec<usize> {
    values
        .iter()
        .map(|v| {
            observations
                .iter()
                .filter(|p| p.get(name) == Some(v))
                .count()
        })
        .collect()
}

/// Parzen mixture of Gaussian kernels with a uniform floor, so empty or
/// distant observation sets never produce a zero density.
fn kernel_density(x: f64, centres: &[f64], bandwidth: f64, lo: f64, hi: f64) -> f64 {
    let floor = 1.0 / (hi - lo).max(f64::EPSILON);
    if centres.is_empty() {
        return floor;
    }
    let sum: f64 = centres
        .iter()
        .map(|c| {
            let z = (x - c) / bandwidth;
            (-0.5 * z * z).exp() / (bandwidth * (2.0 * std::f64::consts::PI).sqrt())
        })
        .sum();
    sum / centres.len() as f64 + floor * 1e-3
}

/// Standard normal draw via Box-Muller.
fn gaussian(rng: &mut StdRng) -> f64 {
    let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
    let u2: f64 = rng.gen_range(0.0..1.0);
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}
