//! Hurst exponent estimation by Detrended Fluctuation Analysis.
//!
//! The series is cut into overlapping segments (step = half the segment
//! length) at roughly 20 log-spaced scales between 4 and n/4. Each segment is
//! detrended with a linear fit and its residual RMS taken; the mean RMS per
//! scale is regressed against the scale in log-log space and the slope is the
//! exponent. The input is used as given, no cumulative profile is built.

use crate::domain::stats::linear_fit;

/// Minimum number of finite returns callers must supply before estimating.
pub const MIN_OBSERVATIONS: usize = 100;

const SCALE_COUNT: usize = 20;
const MIN_SCALE: usize = 4;

/// Estimate the Hurst exponent. `None` when fewer than two scales produce a
/// usable fluctuation (series too short or degenerate).
pub fn dfa(returns: &[f64]) -> Option<f64> {
    let points: Vec<(f64, f64)> = log_spaced_scales(returns.len())
        .into_iter()
        .filter_map(|scale| {
            let fluctuation = mean_fluctuation(returns, scale)?;
            let log_f = fluctuation.ln();
            log_f.is_finite().then(|| ((scale as f64).ln(), log_f))
        })
        .collect();

    if points.len() < 2 {
        return None;
    }

    let (log_scales, log_fluct): (Vec<f64>, Vec<f64>) = points.into_iter().unzip();
    linear_fit(&log_scales, &log_fluct)
        .map(|(slope, _)| slope)
        .filter(|h| h.is_finite())
}

/// Integer scales spaced evenly in log space between 4 and `n / 4`, deduplicated.
pub fn log_spaced_scales(n: usize) -> Vec<usize> {
    let max_scale = n / 4;
    if max_scale < MIN_SCALE {
        return Vec::new();
    }

    let lo = (MIN_SCALE as f64).ln();
    let hi = (max_scale as f64).ln();
    let step = (hi - lo) / (SCALE_COUNT - 1) as f64;

    let mut scales: Vec<usize> = (0..SCALE_COUNT)
        .map(|i| {
            let s = (lo + step * i as f64).exp();
            // Absorb exp/ln round-off so the endpoints land on 4 and n / 4.
            ((s + 1e-9).floor() as usize).clamp(MIN_SCALE, max_scale)
        })
        .collect();
    scales.dedup();
    scales
}

/// Mean residual RMS over all overlapping segments of length `scale`.
fn mean_fluctuation(series: &[f64], scale: usize) -> Option<f64> {
    let n = series.len();
    if scale < 2 || scale > n {
        return None;
    }

    let step = (scale / 2).max(1);
    let x: Vec<f64> = (0..scale).map(|i| i as f64).collect();

    let rms: Vec<f64> = (0..=n - scale)
        .step_by(step)
        .filter_map(|start| segment_rms(&x, &series[start..start + scale]))
        .collect();

    if rms.is_empty() {
        None
    } else {
        Some(rms.iter().sum::<f64>() / rms.len() as f64)
    }
}

fn segment_rms(x: &[f64], segment: &[f64]) -> Option<f64> {
    let (slope, intercept) = linear_fit(x, segment)?;
    let ss = x
        .iter()
        .zip(segment)
        .map(|(&xi, &yi)| {
            let residual = yi - (slope * xi + intercept);
            residual * residual
        })
        .sum::<f64>();
    Some((ss / segment.len() as f64).sqrt())
}
