/// Descriptive statistics for one numeric column.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesStats {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    /// Sample standard deviation (N-1). NaN for a single value.
    pub std_dev: f64,
}

impl SeriesStats {
    /// Compute statistics from values, filtering out NaN and infinities.
    pub fn compute(values: &[f64]) -> Option<Self> {
        let mut vals: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        if vals.is_empty() {
            return None;
        }

        let count = vals.len();
        let min = vals.iter().copied().fold(f64::INFINITY, f64::min);
        let max = vals.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        // Welford: identical inputs keep the running mean exact, so their
        // deviation is exactly zero.
        let mut mean = 0.0;
        let mut m2 = 0.0;
        for (i, &v) in vals.iter().enumerate() {
            let delta = v - mean;
            mean += delta / (i + 1) as f64;
            m2 += delta * (v - mean);
        }
        let std_dev = if count > 1 {
            (m2 / (count - 1) as f64).sqrt()
        } else {
            f64::NAN
        };

        vals.sort_by(|a, b| a.total_cmp(b));
        let median = if count % 2 == 0 {
            (vals[count / 2 - 1] + vals[count / 2]) / 2.0
        } else {
            vals[count / 2]
        };

        Some(SeriesStats {
            count,
            min,
            max,
            mean,
            median,
            std_dev,
        })
    }

    /// `std_dev / |mean| * 100`. `None` when the mean is zero or the
    /// deviation is undefined.
    pub fn coefficient_of_variation(&self) -> Option<f64> {
        if self.mean == 0.0 || !self.std_dev.is_finite() {
            return None;
        }
        Some(self.std_dev / self.mean.abs() * 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_stats() {
        let s = SeriesStats::compute(&[4.0, 1.0, 3.0, 2.0]).unwrap();
        assert_eq!(s.count, 4);
        assert_eq!(s.min, 1.0);
        assert_eq!(s.max, 4.0);
        assert!((s.mean - 2.5).abs() < 1e-12);
        assert_eq!(s.median, 2.5);
        // sample variance of 1..4 is 5/3
        assert!((s.std_dev - (5.0f64 / 3.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_odd_median() {
        let s = SeriesStats::compute(&[9.0, 1.0, 5.0]).unwrap();
        assert_eq!(s.median, 5.0);
    }

    #[test]
    fn test_identical_values_have_zero_spread() {
        let vals = vec![0.1; 37];
        let s = SeriesStats::compute(&vals).unwrap();
        assert_eq!(s.mean, 0.1);
        assert_eq!(s.std_dev, 0.0);
        assert_eq!(s.coefficient_of_variation(), Some(0.0));
    }

    #[test]
    fn test_single_value() {
        let s = SeriesStats::compute(&[0.002]).unwrap();
        assert_eq!(s.count, 1);
        assert_eq!(s.median, 0.002);
        assert!(s.std_dev.is_nan());
        assert_eq!(s.coefficient_of_variation(), None);
    }

    #[test]
    fn test_cv_undefined_for_zero_mean() {
        let s = SeriesStats::compute(&[-1.0, 1.0]).unwrap();
        assert_eq!(s.mean, 0.0);
        assert_eq!(s.coefficient_of_variation(), None);
    }

    #[test]
    fn test_cv_uses_absolute_mean() {
        let s = SeriesStats::compute(&[-2.0, -4.0]).unwrap();
        let cv = s.coefficient_of_variation().unwrap();
        assert!((cv - (2.0f64.sqrt() / 3.0 * 100.0)).abs() < 1e-9);
    }

    #[test]
    fn test_non_finite_filtered() {
        assert!(SeriesStats::compute(&[]).is_none());
        assert!(SeriesStats::compute(&[f64::NAN]).is_none());
        let s = SeriesStats::compute(&[1.0, f64::NAN, 3.0, f64::INFINITY]).unwrap();
        assert_eq!(s.count, 2);
        assert_eq!(s.mean, 2.0);
    }
}
