// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Orbital Simulation Engine - Bench Report Types
// Structured output for offline analysis of headless runs

use serde::Serialize;

// ─── Statistics (per-metric aggregation across seeds) ───────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct Stats {
    pub mean: f64,
    pub std_dev: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
    pub min: f64,
    pub max: f64,
    pub n: usize,
}

impl Stats {
    pub fn from_samples(samples: &[f64]) -> Self {
        let n = samples.len();
        if n == 0 {
            return Self { mean: 0.0, std_dev: 0.0, ci_lower: 0.0, ci_upper: 0.0, min: 0.0, max: 0.0, n: 0 };
        }
        let mean = samples.iter().sum::<f64>() / n as f64;
        let variance = if n > 1 {
            samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1) as f64
        } else {
            0.0
        };
        let std_dev = variance.sqrt();
        let stderr = std_dev / (n as f64).sqrt();
        let z = 1.96; // 95% CI
        Self {
            mean,
            std_dev,
            ci_lower: mean - z * stderr,
            ci_upper: mean + z * stderr,
            min: samples.iter().cloned().fold(f64::INFINITY, f64::min),
            max: samples.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
            n,
        }
    }

    pub fn of<T>(runs: &[T], metric: impl Fn(&T) -> f64) -> Self {
        let samples: Vec<f64> = runs.iter().map(metric).collect();
        Self::from_samples(&samples)
    }
}

// ─── Single-Run Result ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub seed: u64,
    pub pass: bool,
    pub ticks: u64,
    pub bodies: usize,
    pub entities: usize,
    pub broadcasts: u64,
    pub flushes: u64,
    pub escaped: usize,
    pub captured: usize,
    pub wells_fired: usize,
    pub entities_docked: usize,
    /// Highest speed seen on any movable body after any tick.
    pub peak_speed: f64,
    pub speed_cap_breaches: u32,
    pub out_of_bounds: u32,
    pub final_connections: usize,
    pub final_orbit_locks: usize,
    pub final_gravity_wells: usize,
    pub elapsed_ms: u128,
    pub ticks_per_sec: f64,
}

// ─── Aggregated Report ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct SeriesReport {
    pub n_runs: usize,
    pub pass_rate: f64,
    pub escaped: Stats,
    pub captured: Stats,
    pub wells_fired: Stats,
    pub peak_speed: Stats,
    pub final_connections: Stats,
    pub elapsed_ms: Stats,
    pub ticks_per_sec: Stats,
    pub individual_runs: Vec<RunResult>,
}

impl SeriesReport {
    pub fn from_runs(runs: Vec<RunResult>) -> Self {
        let n_runs = runs.len();
        let passed = runs.iter().filter(|r| r.pass).count();
        Self {
            n_runs,
            pass_rate: if n_runs > 0 { passed as f64 / n_runs as f64 } else { 0.0 },
            escaped: Stats::of(&runs, |r| r.escaped as f64),
            captured: Stats::of(&runs, |r| r.captured as f64),
            wells_fired: Stats::of(&runs, |r| r.wells_fired as f64),
            peak_speed: Stats::of(&runs, |r| r.peak_speed),
            final_connections: Stats::of(&runs, |r| r.final_connections as f64),
            elapsed_ms: Stats::of(&runs, |r| r.elapsed_ms as f64),
            ticks_per_sec: Stats::of(&runs, |r| r.ticks_per_sec),
            individual_runs: runs,
        }
    }
}

// ─── Top-Level Report ───────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct BenchReport {
    pub timestamp: String,
    pub version: &'static str,
    pub prng: &'static str,
    pub base_seed: u64,
    pub ticks_per_run: u64,
    pub simulation_speed: f64,
    pub galaxies_per_anomaly: usize,
    pub series: SeriesReport,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_single_sample() {
        let s = Stats::from_samples(&[4.0]);
        assert_eq!(s.mean, 4.0);
        assert_eq!(s.std_dev, 0.0);
        assert_eq!(s.min, 4.0);
        assert_eq!(s.max, 4.0);
    }

    #[test]
    fn test_stats_spread() {
        let s = Stats::from_samples(&[1.0, 2.0, 3.0]);
        assert!((s.mean - 2.0).abs() < 1e-12);
        assert!((s.std_dev - 1.0).abs() < 1e-12);
        assert!(s.ci_lower < s.mean && s.ci_upper > s.mean);
    }

    #[test]
    fn test_stats_empty() {
        assert_eq!(Stats::from_samples(&[]).n, 0);
    }
}
