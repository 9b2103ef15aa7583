//! Post-run statistics of an energy series.

use serde::Serialize;

#[derive(Serialize, Debug, Clone, Copy)]
pub struct BlockAnalysis {
    pub mean: f64,
    /// Standard error at the optimal reblocking level
    pub error: f64,
    /// (error / naive error)^2, in units of the sample spacing
    pub autocorrelation_time: f64,
    pub nsamples: usize,
}

/// Standard error of the block means at one reblocking level.
#[derive(Serialize, Debug, Clone, Copy)]
pub struct BlockLevel {
    pub block_size: usize,
    pub nblocks: usize,
    pub error: f64,
}

/// Mean, autocorrelation time and reblocked error of `series[discard..]`.
///
/// Returns `None` if fewer than two samples remain.
pub fn block_average(series: &[f64], discard: usize) -> Option<BlockAnalysis> {
    let data = series.get(discard..)?;
    if data.len() < 2 {
        return None;
    }
    let mean = data.iter().sum::<f64>() / data.len() as f64;
    let levels = reblock(data);
    let naive = levels[0].error;
    let error = optimal_level(&levels, data.len()).map_or(naive, |l| l.error);
    let autocorrelation_time = if naive > 0.0 { (error / naive).powi(2) } else { 1.0 };
    Some(BlockAnalysis { mean, error, autocorrelation_time, nsamples: data.len() })
}

/// Repeatedly average neighbouring pairs while at least two blocks remain.
///
/// Level k holds blocks of 2^k samples; a trailing odd block is dropped.
pub fn reblock(series: &[f64]) -> Vec<BlockLevel> {
    let mut levels = Vec::new();
    let mut blocks = series.to_vec();
    let mut block_size = 1;
    while blocks.len() >= 2 {
        levels.push(BlockLevel { block_size, nblocks: blocks.len(), error: standard_error(&blocks) });
        blocks = blocks.chunks_exact(2).map(|pair| 0.5 * (pair[0] + pair[1])).collect();
        block_size *= 2;
    }
    levels
}

/// First level with B^3 > 2 N (err_B / err_1)^4, the smallest block size
/// long compared to the correlation length.
///
/// Falls back to the last level with at least four blocks.
pub fn optimal_level(levels: &[BlockLevel], nsamples: usize) -> Option<&BlockLevel> {
    let naive = levels.first()?.error;
    if naive == 0.0 {
        return levels.first();
    }
    levels
        .iter()
        .find(|l| (l.block_size as f64).powi(3) > 2.0 * nsamples as f64 * (l.error / naive).powi(4))
        .or_else(|| levels.iter().rev().find(|l| l.nblocks >= 4))
        .or(levels.first())
}

fn standard_error(blocks: &[f64]) -> f64 {
    let n = blocks.len() as f64;
    let mean = blocks.iter().sum::<f64>() / n;
    let variance = blocks.iter().map(|&x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);
    (variance / n).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rand_distr::{Distribution, Normal};

    #[test]
    fn test_constant_series() {
        let series = vec![-1.5; 100];
        let stats = block_average(&series, 10).unwrap();
        assert_relative_eq!(stats.mean, -1.5);
        assert_relative_eq!(stats.error, 0.0);
        assert_relative_eq!(stats.autocorrelation_time, 1.0);
        assert_eq!(stats.nsamples, 90);
    }

    #[test]
    fn test_too_short_series() {
        assert!(block_average(&[1.0, 2.0, 3.0], 2).is_none());
        assert!(block_average(&[1.0], 5).is_none());
    }

    #[test]
    fn test_white_noise_error() {
        let mut rng = StdRng::seed_from_u64(42);
        let dist = Normal::new(0.0, 1.0).unwrap();
        let series: Vec<f64> = (0..20000).map(|_| dist.sample(&mut rng)).collect();
        let stats = block_average(&series, 0).unwrap();
        // uncorrelated: error close to sigma / sqrt(N)
        let naive = 1.0 / (series.len() as f64).sqrt();
        assert!(stats.error > 0.5 * naive && stats.error < 2.5 * naive);
        assert!(stats.mean.abs() < 5.0 * naive);
        assert!(stats.autocorrelation_time > 0.5 && stats.autocorrelation_time < 2.5);
    }

    #[test]
    fn test_correlated_series_error_grows() {
        // AR(1) with a = 0.9 has integrated autocorrelation time (1 + a) / (1 - a) = 19
        let a = 0.9;
        let mut rng = StdRng::seed_from_u64(5);
        let dist = Normal::new(0.0, 1.0).unwrap();
        let mut x = 0.0;
        let series: Vec<f64> = (0..20000)
            .map(|_| {
                x = a * x + dist.sample(&mut rng);
                x
            })
            .collect();
        let stats = block_average(&series, 0).unwrap();
        assert!(stats.autocorrelation_time > 10.0 && stats.autocorrelation_time < 30.0, "{}", stats.autocorrelation_time);

        let levels = reblock(&series);
        assert_relative_eq!(stats.error.powi(2), levels[0].error.powi(2) * stats.autocorrelation_time, epsilon = 1e-15);
        assert!(stats.error > 3.0 * levels[0].error);
    }

    #[test]
    fn test_reblock_levels() {
        let series: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let levels = reblock(&series);
        let sizes: Vec<_> = levels.iter().map(|l| (l.block_size, l.nblocks)).collect();
        assert_eq!(sizes, vec![(1, 10), (2, 5), (4, 2)]);
        // 0..10 has sample variance 55/6
        assert_relative_eq!(levels[0].error, (55.0 / 6.0 / 10.0f64).sqrt(), epsilon = 1e-12);
    }
}
