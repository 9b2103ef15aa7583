//! Population control: branching schemes that redistribute walker weight
//! while keeping the number of walkers fixed.

use rand::distributions::{Distribution, Uniform};
use rand::Rng;

use super::ensemble::WalkerEnsemble;
use super::walker::Walker;
use crate::io::{AfqmcConfig, PopControlScheme};

#[derive(Debug, Clone, Copy)]
pub struct PopulationControl {
    pub scheme: PopControlScheme,
    pub freq: usize,
    pub min_weight: f64,
    pub max_weight: f64,
}

impl PopulationControl {
    pub fn from_config(config: &AfqmcConfig) -> Self {
        Self {
            scheme: config.pop_control,
            freq: config.pop_control_freq,
            min_weight: config.min_weight,
            max_weight: config.max_weight,
        }
    }
}

impl WalkerEnsemble {
    /// Record unscaled weights and branch, every `control.freq` steps.
    ///
    /// Unscaled weights stay with their slot: branching moves walker state
    /// and rescales `weight` only. Returns true if branching ran at this step.
    pub fn weight_control<R: Rng>(&mut self, step: usize, control: &PopulationControl, rng: &mut R) -> bool {
        if (step + 1) % control.freq != 0 {
            return false;
        }
        let unscaled: Vec<f64> = self.walkers.iter().map(|w| w.weight).collect();
        for (walker, &w) in self.walkers.iter_mut().zip(&unscaled) {
            walker.unscaled_weight = w;
        }
        if self.total_weight() <= 0.0 {
            tracing::warn!("step {}: every walker has zero weight, skipping population control", step);
            return true;
        }
        match control.scheme {
            PopControlScheme::PairBranch => {
                pair_branch(&mut self.walkers, control.min_weight, control.max_weight, rng)
            }
            PopControlScheme::Comb => comb(&mut self.walkers, rng),
        }
        for (walker, &w) in self.walkers.iter_mut().zip(&unscaled) {
            walker.unscaled_weight = w;
        }
        true
    }
}

/// Pair the heaviest walkers with the lightest ones in a single pass.
///
/// For each pair one of the two survives in both slots with probability
/// proportional to its weight, and both copies carry half the pair weight.
pub fn pair_branch<R: Rng>(walkers: &mut [Walker], min_weight: f64, max_weight: f64, rng: &mut R) {
    let n = walkers.len();
    if n < 2 {
        return;
    }
    let mean = walkers.iter().map(|w| w.weight).sum::<f64>() / n as f64;
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| walkers[a].weight.total_cmp(&walkers[b].weight));

    let uniform = Uniform::new(0.0, 1.0);
    let (mut lo, mut hi) = (0, n - 1);
    let mut npairs = 0;
    while lo < hi {
        let (light, heavy) = (order[lo], order[hi]);
        let (w_light, w_heavy) = (walkers[light].weight, walkers[heavy].weight);
        if w_heavy <= max_weight * mean && w_light >= min_weight * mean {
            break;
        }
        let total = w_light + w_heavy;
        if total <= 0.0 {
            break;
        }
        let (keep, drop) = if uniform.sample(rng) < w_heavy / total {
            (heavy, light)
        } else {
            (light, heavy)
        };
        walkers[drop] = walkers[keep].clone();
        walkers[keep].weight = 0.5 * total;
        walkers[drop].weight = 0.5 * total;
        npairs += 1;
        lo += 1;
        hi -= 1;
    }
    tracing::trace!("pair branching: {} pairs", npairs);
}

/// Systematic resampling: Nw equally spaced teeth over the cumulative weight.
pub fn comb<R: Rng>(walkers: &mut Vec<Walker>, rng: &mut R) {
    let n = walkers.len();
    let total: f64 = walkers.iter().map(|w| w.weight).sum();
    if n == 0 || total <= 0.0 {
        return;
    }
    let spacing = total / n as f64;
    let offset = Uniform::new(0.0, 1.0).sample(rng);

    let mut selected = Vec::with_capacity(n);
    let mut cumulative = 0.0;
    let mut k = 0;
    for (i, walker) in walkers.iter().enumerate() {
        cumulative += walker.weight;
        while k < n && (k as f64 + offset) * spacing < cumulative {
            selected.push(i);
            k += 1;
        }
    }
    // rounding can leave the last tooth beyond the final cumulative sum
    while selected.len() < n {
        let last = walkers.iter().rposition(|w| w.is_alive()).unwrap_or(n - 1);
        selected.push(last);
    }

    let mut resampled: Vec<Walker> = selected.iter().map(|&i| walkers[i].clone()).collect();
    for walker in resampled.iter_mut() {
        walker.weight = spacing;
    }
    *walkers = resampled;
}
