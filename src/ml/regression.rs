//! 1-D ordinary least-squares regression

use serde::{Deserialize, Serialize};

use super::ForecastError;

/// A fitted line `y = slope * x + intercept`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionModel {
    pub slope: f64,
    pub intercept: f64,
}

impl RegressionModel {
    /// Fit a line through `(xs, ys)` using the closed-form least-squares solution.
    ///
    /// When every `x` is the same the slope is zero and the line passes
    /// through the mean of `ys`.
    pub fn train(xs: &[f64], ys: &[f64]) -> Result<Self, ForecastError> {
        if xs.is_empty() || ys.is_empty() {
            return Err(ForecastError::InvalidInput(
                "regression requires at least one sample".to_string(),
            ));
        }

        if xs.len() != ys.len() {
            return Err(ForecastError::InvalidInput(format!(
                "x and y lengths mismatch: {} vs {}",
                xs.len(),
                ys.len()
            )));
        }

        let n = xs.len() as f64;
        let mean_x = xs.iter().sum::<f64>() / n;
        let mean_y = ys.iter().sum::<f64>() / n;

        let mut numerator = 0.0;
        let mut denominator = 0.0;

        for (&x, &y) in xs.iter().zip(ys) {
            numerator += (x - mean_x) * (y - mean_y);
            denominator += (x - mean_x).powi(2);
        }

        // Rounding in the mean can leave a tiny non-zero spread for a constant x
        let constant_x = xs.iter().all(|&x| x == xs[0]);
        let slope = if constant_x || denominator == 0.0 {
            0.0
        } else {
            numerator / denominator
        };

        Ok(Self {
            slope,
            intercept: mean_y - slope * mean_x,
        })
    }

    pub fn predict(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }

    /// Mean squared error of the fitted line over `(xs, ys)`
    pub fn mean_squared_error(&self, xs: &[f64], ys: &[f64]) -> f64 {
        if xs.is_empty() || xs.len() != ys.len() {
            return f64::MAX;
        }

        let sum_sq_error: f64 = xs
            .iter()
            .zip(ys)
            .map(|(&x, &y)| (self.predict(x) - y).powi(2))
            .sum();

        sum_sq_error / xs.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_train_empty_data() {
        let result = RegressionModel::train(&[], &[]);
        assert!(matches!(result, Err(ForecastError::InvalidInput(_))));
    }

    #[test]
    fn test_train_mismatched_lengths() {
        let result = RegressionModel::train(&[1.0, 2.0, 3.0], &[1.0]);
        assert!(matches!(result, Err(ForecastError::InvalidInput(_))));
    }

    #[test]
    fn test_perfect_line() {
        let xs = [0.0, 1.0, 2.0, 3.0];
        let ys = [1.0, 3.0, 5.0, 7.0];

        let model = RegressionModel::train(&xs, &ys).unwrap();

        assert_close(model.slope, 2.0);
        assert_close(model.intercept, 1.0);
        assert_close(model.predict(10.0), 21.0);
        assert_close(model.mean_squared_error(&xs, &ys), 0.0);
    }

    #[test]
    fn test_two_points_fit_exactly() {
        let model = RegressionModel::train(&[32.0, 57.0], &[3.0, 1.0]).unwrap();

        assert_close(model.predict(32.0), 3.0);
        assert_close(model.predict(57.0), 1.0);
    }

    #[test]
    fn test_constant_x_has_zero_slope() {
        let model = RegressionModel::train(&[5.0, 5.0, 5.0], &[2.0, 4.0, 9.0]).unwrap();

        assert_eq!(model.slope, 0.0);
        assert_close(model.intercept, 5.0);
    }

    #[test]
    fn test_two_closely_spaced_points_fit_exactly() {
        let model = RegressionModel::train(&[0.0, 1e-8], &[0.0, 1.0]).unwrap();

        assert!(model.slope > 0.0);
        assert_close(model.predict(0.0), 0.0);
        assert_close(model.predict(1e-8), 1.0);
    }

    #[test]
    fn test_constant_fractional_x_has_zero_slope() {
        let model = RegressionModel::train(&[0.1, 0.1, 0.1], &[1.0, 2.0, 6.0]).unwrap();

        assert_eq!(model.slope, 0.0);
        assert_close(model.intercept, 3.0);
    }

    #[test]
    fn test_single_sample() {
        let model = RegressionModel::train(&[12.0], &[4.0]).unwrap();

        assert_eq!(model.slope, 0.0);
        assert_close(model.predict(100.0), 4.0);
    }

    #[test]
    fn test_least_squares_with_noise() {
        // Symmetric residuals around y = x
        let xs = [0.0, 1.0, 2.0, 3.0];
        let ys = [1.0, 0.0, 3.0, 2.0];

        let model = RegressionModel::train(&xs, &ys).unwrap();

        assert_close(model.slope, 0.6);
        assert_close(model.intercept, 0.6);
        assert!(model.mean_squared_error(&xs, &ys) > 0.0);
    }

    #[test]
    fn test_mse_mismatched_is_max() {
        let model = RegressionModel {
            slope: 1.0,
            intercept: 0.0,
        };
        assert_eq!(model.mean_squared_error(&[1.0], &[]), f64::MAX);
    }

    // ==================== Property-Based Tests ====================

    mod proptest_tests {
        use proptest::prelude::*;

        use super::*;

        proptest! {
            #[test]
            fn exact_through_two_distinct_points(
                a in -100i32..100,
                gap in 1i32..50,
                ya in -1000i32..1000,
                yb in -1000i32..1000
            ) {
                let xa = f64::from(a);
                let xb = f64::from(a + gap);
                let model = RegressionModel::train(&[xa, xb], &[f64::from(ya), f64::from(yb)]).unwrap();

                prop_assert!((model.predict(xa) - f64::from(ya)).abs() < 1e-6);
                prop_assert!((model.predict(xb) - f64::from(yb)).abs() < 1e-6);
            }

            #[test]
            fn mismatched_lengths_rejected(
                xs in prop::collection::vec(0i32..100, 1..10),
                extra in 1usize..5
            ) {
                let xs: Vec<f64> = xs.into_iter().map(f64::from).collect();
                let ys = vec![1.0; xs.len() + extra];

                prop_assert!(matches!(
                    RegressionModel::train(&xs, &ys),
                    Err(ForecastError::InvalidInput(_))
                ));
            }
        }
    }
}
