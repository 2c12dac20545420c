use anyhow::{Result, ensure};

use crate::error::PipelineError;

pub trait ProbabilityEstimator {
    fn predict_proba(&self, rows: &[Vec<f64>]) -> Result<Vec<[f64; 2]>>;
}

#[derive(Debug, Clone)]
pub struct LogisticScorer {
    pub weights: Vec<f64>,
    pub bias: f64,
}

impl ProbabilityEstimator for LogisticScorer {
    fn predict_proba(&self, rows: &[Vec<f64>]) -> Result<Vec<[f64; 2]>> {
        rows.iter()
            .enumerate()
            .map(|(idx, row)| {
                ensure!(
                    row.len() == self.weights.len(),
                    "row {idx} has {} features, scorer expects {}",
                    row.len(),
                    self.weights.len()
                );
                let z = self.bias
                    + row
                        .iter()
                        .zip(&self.weights)
                        .filter(|(x, _)| !x.is_nan())
                        .map(|(x, w)| x * w)
                        .sum::<f64>();
                let p = 1.0 / (1.0 + (-z).exp());
                Ok([1.0 - p, p])
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct ThresholdClassifier<E> {
    estimator: E,
    threshold: f64,
}

impl<E: ProbabilityEstimator> ThresholdClassifier<E> {
    pub const DEFAULT_THRESHOLD: f64 = 0.5;

    pub fn new(estimator: E, threshold: f64) -> std::result::Result<Self, PipelineError> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(PipelineError::config(format!(
                "threshold must lie in [0, 1], got {threshold}"
            )));
        }
        Ok(Self {
            estimator,
            threshold,
        })
    }

    pub fn with_default_threshold(estimator: E) -> Self {
        Self {
            estimator,
            threshold: Self::DEFAULT_THRESHOLD,
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn estimator(&self) -> &E {
        &self.estimator
    }

    /// 1 where `p(class 1)` is strictly above the threshold, else 0.
    pub fn predict(&self, rows: &[Vec<f64>]) -> Result<Vec<u8>> {
        let proba = self.estimator.predict_proba(rows)?;
        Ok(proba
            .iter()
            .map(|p| u8::from(p[1] > self.threshold))
            .collect())
    }
}

impl<E: ProbabilityEstimator> ProbabilityEstimator for ThresholdClassifier<E> {
    fn predict_proba(&self, rows: &[Vec<f64>]) -> Result<Vec<[f64; 2]>> {
        self.estimator.predict_proba(rows)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BinaryMetrics {
    pub true_pos: usize,
    pub false_pos: usize,
    pub true_neg: usize,
    pub false_neg: usize,
}

impl BinaryMetrics {
    pub fn from_predictions(predicted: &[u8], actual: &[u8]) -> Result<Self> {
        ensure!(
            predicted.len() == actual.len(),
            "{} predictions for {} labels",
            predicted.len(),
            actual.len()
        );
        let mut m = Self::default();
        for (p, a) in predicted.iter().zip(actual) {
            match (*p == 1, *a == 1) {
                (true, true) => m.true_pos += 1,
                (true, false) => m.false_pos += 1,
                (false, false) => m.true_neg += 1,
                (false, true) => m.false_neg += 1,
            }
        }
        Ok(m)
    }

    pub fn total(&self) -> usize {
        self.true_pos + self.false_pos + self.true_neg + self.false_neg
    }

    pub fn accuracy(&self) -> Option<f64> {
        ratio(self.true_pos + self.true_neg, self.total())
    }

    pub fn precision(&self) -> Option<f64> {
        ratio(self.true_pos, self.true_pos + self.false_pos)
    }

    pub fn recall(&self) -> Option<f64> {
        ratio(self.true_pos, self.true_pos + self.false_neg)
    }

    pub fn f1(&self) -> Option<f64> {
        let (p, r) = (self.precision()?, self.recall()?);
        (p + r > 0.0).then(|| 2.0 * p * r / (p + r))
    }
}

fn ratio(num: usize, den: usize) -> Option<f64> {
    (den > 0).then(|| num as f64 / den as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    struct Fixed(Vec<f64>);

    impl ProbabilityEstimator for Fixed {
        fn predict_proba(&self, rows: &[Vec<f64>]) -> Result<Vec<[f64; 2]>> {
            Ok(self.0.iter().take(rows.len()).map(|p| [1.0 - p, *p]).collect())
        }
    }

    #[test]
    fn predicts_strictly_above_threshold() {
        let rows = vec![vec![0.0]; 4];
        let clf = ThresholdClassifier::with_default_threshold(Fixed(vec![0.2, 0.5, 0.51, 0.9]));
        assert_eq!(clf.predict(&rows).unwrap(), vec![0, 0, 1, 1]);

        let strict = ThresholdClassifier::new(Fixed(vec![0.2, 0.5, 0.51, 0.9]), 0.8).unwrap();
        assert_eq!(strict.predict(&rows).unwrap(), vec![0, 0, 0, 1]);
    }

    #[test]
    fn out_of_range_threshold_is_rejected() {
        assert!(matches!(
            ThresholdClassifier::new(Fixed(vec![]), 1.5),
            Err(PipelineError::Configuration(_))
        ));
    }

    #[test]
    fn logistic_scorer_skips_undefined_features() {
        let scorer = LogisticScorer {
            weights: vec![1.0, 2.0],
            bias: 0.0,
        };
        let proba = scorer.predict_proba(&[vec![0.0, f64::NAN]]).unwrap();
        assert_relative_eq!(proba[0][1], 0.5);
        assert!(scorer.predict_proba(&[vec![1.0]]).is_err());
    }

    #[test]
    fn metrics_from_predictions() {
        let m = BinaryMetrics::from_predictions(&[1, 1, 0, 0], &[1, 0, 0, 1]).unwrap();
        assert_eq!(m.total(), 4);
        assert_eq!(m.accuracy(), Some(0.5));
        assert_eq!(m.precision(), Some(0.5));
        assert_eq!(m.recall(), Some(0.5));
        assert_relative_eq!(m.f1().unwrap(), 0.5);
        assert_eq!(BinaryMetrics::default().accuracy(), None);
    }
}
