//! Small numeric helpers shared by the regime classifier and the
//! walk-forward Sharpe/DSR calculations.

/// Population mean and standard deviation of `data`. Returns `(0.0, 0.0)`
/// for an empty slice.
#[inline]
pub fn mean_and_stddev(data: &[f64]) -> (f64, f64) {
    let count = data.len();
    if count == 0 {
        return (0.0, 0.0);
    }

    let mean = data.iter().sum::<f64>() / count as f64;
    let variance = data.iter().map(|value| (value - mean).powi(2)).sum::<f64>() / count as f64;

    (mean, variance.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_and_stddev_of_constant_series_is_zero_variance() {
        let (mean, std) = mean_and_stddev(&[2.0, 2.0, 2.0]);
        assert_eq!(mean, 2.0);
        assert_eq!(std, 0.0);
    }

    #[test]
    fn mean_and_stddev_of_empty_is_zero() {
        assert_eq!(mean_and_stddev(&[]), (0.0, 0.0));
    }
}
