//! Weighted running means.

/// Running mean where every pushed value carries a weight.
///
/// With batch size as the weight this reproduces the per-sample mean of a
/// mean-reduced loss, regardless of how the samples were split into batches.
/// With weight 1 it is a plain mean over pushes.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunningMean {
    sum: f64,
    weight: usize,
}

impl RunningMean {
    pub const fn new() -> Self {
        Self { sum: 0.0, weight: 0 }
    }

    pub fn push(&mut self, value: f64, weight: usize) {
        self.sum += value * weight as f64;
        self.weight += weight;
    }

    /// The mean so far, or `0.0` if nothing was pushed.
    #[must_use]
    pub fn value(&self) -> f64 {
        if self.weight == 0 {
            return 0.0;
        }
        self.sum / self.weight as f64
    }

    /// Total weight pushed so far.
    pub const fn weight(&self) -> usize {
        self.weight
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weighted_by_batch_size() {
        let mut mean = RunningMean::new();
        // Batch of 3 samples with mean loss 1.0, trailing batch of 1 with loss 5.0.
        mean.push(1.0, 3);
        mean.push(5.0, 1);

        assert!((mean.value() - 2.0).abs() < 1e-12);
        assert_eq!(mean.weight(), 4);
    }

    #[test]
    fn test_empty_mean() {
        assert_eq!(RunningMean::new().value(), 0.0);
    }
}
