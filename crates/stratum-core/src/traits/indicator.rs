//! Indicator traits.

use crate::error::IndicatorError;
use crate::types::Bar;

/// Batch indicator over a price slice.
pub trait Indicator: Send + Sync {
    type Output;

    /// One output per input point once warmed up.
    fn calculate(&self, data: &[f64]) -> Vec<Self::Output>;

    /// Points needed before the first output.
    fn period(&self) -> usize;

    fn name(&self) -> &str;

    fn validate_data(&self, data: &[f64]) -> Result<(), IndicatorError> {
        if data.len() < self.period() {
            return Err(IndicatorError::InsufficientData {
                required: self.period(),
                available: data.len(),
            });
        }
        Ok(())
    }
}

/// Incrementally updated indicator over a scalar stream.
pub trait StreamingIndicator: Send + Sync {
    type Output;

    /// Feed one value; returns the new output once ready.
    fn update(&mut self, value: f64) -> Option<Self::Output>;

    fn current(&self) -> Option<Self::Output>;

    fn reset(&mut self);

    fn is_ready(&self) -> bool;

    fn period(&self) -> usize;

    fn name(&self) -> &str;
}

/// Incrementally updated indicator that needs the whole bar (ATR and friends).
pub trait BarIndicator: Send + Sync {
    type Output;

    fn update_bar(&mut self, bar: &Bar) -> Option<Self::Output>;

    fn current(&self) -> Option<Self::Output>;

    fn reset(&mut self);

    fn is_ready(&self) -> bool;

    fn period(&self) -> usize;

    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct RangeSum {
        period: usize,
    }

    impl Indicator for RangeSum {
        type Output = f64;

        fn calculate(&self, data: &[f64]) -> Vec<f64> {
            data.windows(self.period).map(|w| w.iter().sum()).collect()
        }

        fn period(&self) -> usize {
            self.period
        }

        fn name(&self) -> &str {
            "range_sum"
        }
    }

    #[test]
    fn test_validate_data_reports_shortfall() {
        let indicator = RangeSum { period: 4 };
        assert_eq!(
            indicator.validate_data(&[1.0, 2.0]),
            Err(IndicatorError::InsufficientData {
                required: 4,
                available: 2
            })
        );
        assert!(indicator.validate_data(&[1.0; 4]).is_ok());
        assert_eq!(indicator.calculate(&[1.0, 2.0, 3.0, 4.0, 5.0]), vec![10.0, 14.0]);
    }
}
