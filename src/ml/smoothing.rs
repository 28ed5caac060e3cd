//! Trailing moving average used as a diagnostic series in the artifact bundle

/// Average each position over the trailing window `series[i - window + 1..=i]`.
///
/// The window shrinks near the start of the series; there is no look-ahead
/// and no padding. A window of 0 or 1 returns the input unchanged.
pub fn moving_average(series: &[f64], window_size: usize) -> Vec<f64> {
    if window_size <= 1 {
        return series.to_vec();
    }

    (0..series.len())
        .map(|i| {
            let start = (i + 1).saturating_sub(window_size);
            let window = &series[start..=i];
            window.iter().sum::<f64>() / window.len() as f64
        })
        .collect()
}
