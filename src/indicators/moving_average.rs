/// Rolling SMA over a partially defined series
///
/// Output is aligned with the input. A value is defined only when every
/// input in its trailing window is defined, so undefined warm-up bars
/// propagate instead of being averaged as zero.
pub fn sma_series(values: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if period == 0 {
        return out;
    }

    for i in (period - 1)..values.len() {
        let window = &values[i + 1 - period..=i];
        let sum: Option<f64> = window.iter().copied().sum();
        out[i] = sum.map(|s| s / period as f64);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sma() {
        let prices: Vec<Option<f64>> = [100.0, 102.0, 104.0, 106.0, 108.0].map(Some).to_vec();
        let sma = sma_series(&prices, 5);
        assert_eq!(sma.last().copied().flatten(), Some(104.0));
    }

    #[test]
    fn test_sma_insufficient_data() {
        let prices = vec![Some(100.0), Some(102.0)];
        let sma = sma_series(&prices, 5);
        assert!(sma.iter().all(|v| v.is_none()));
    }

    #[test]
    fn test_sma_series_alignment() {
        let values: Vec<Option<f64>> = vec![Some(1.0), Some(2.0), Some(3.0), Some(4.0)];
        let out = sma_series(&values, 2);
        assert_eq!(out, vec![None, Some(1.5), Some(2.5), Some(3.5)]);
    }

    #[test]
    fn test_sma_series_propagates_gaps() {
        let values = vec![None, Some(2.0), Some(4.0), Some(6.0)];
        let out = sma_series(&values, 2);
        assert_eq!(out, vec![None, None, Some(3.0), Some(5.0)]);
    }
}
