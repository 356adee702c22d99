use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::error::{EvalResult, EvaluationError};

/// Growth ≥ 0 is class 1 (up), otherwise class 0 (down).
pub fn growth_class(growth: f64) -> u8 {
    if growth >= 0.0 {
        1
    } else {
        0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Per-class precision/recall/F1 with accuracy and averages. Undefined
/// ratios (no predicted or no actual members) are reported as 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    pub classes: Vec<(u8, ClassMetrics)>,
    pub accuracy: f64,
    pub macro_avg: ClassMetrics,
    pub weighted_avg: ClassMetrics,
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

impl ClassificationReport {
    pub fn from_labels(actual: &[u8], predicted: &[u8]) -> EvalResult<Self> {
        if actual.len() != predicted.len() || actual.is_empty() {
            return Err(EvaluationError::InvalidArgument(format!(
                "classification needs two equal, non-empty label sets (got {} and {})",
                actual.len(),
                predicted.len()
            )));
        }

        let labels: BTreeSet<u8> = actual.iter().chain(predicted).copied().collect();
        let total = actual.len();

        let classes: Vec<(u8, ClassMetrics)> = labels
            .iter()
            .map(|&label| {
                let pairs = actual.iter().zip(predicted);
                let tp = pairs.clone().filter(|(a, p)| **a == label && **p == label).count();
                let predicted_pos = predicted.iter().filter(|p| **p == label).count();
                let support = actual.iter().filter(|a| **a == label).count();

                let precision = ratio(tp, predicted_pos);
                let recall = ratio(tp, support);
                let f1 = if precision + recall == 0.0 {
                    0.0
                } else {
                    2.0 * precision * recall / (precision + recall)
                };
                (label, ClassMetrics { precision, recall, f1, support })
            })
            .collect();

        let correct = actual.iter().zip(predicted).filter(|(a, p)| a == p).count();
        let n = classes.len() as f64;
        let mean = |f: fn(&ClassMetrics) -> f64| classes.iter().map(|(_, m)| f(m)).sum::<f64>() / n;
        let weighted = |f: fn(&ClassMetrics) -> f64| {
            classes
                .iter()
                .map(|(_, m)| f(m) * m.support as f64)
                .sum::<f64>()
                / total as f64
        };

        Ok(Self {
            macro_avg: ClassMetrics {
                precision: mean(|m| m.precision),
                recall: mean(|m| m.recall),
                f1: mean(|m| m.f1),
                support: total,
            },
            weighted_avg: ClassMetrics {
                precision: weighted(|m| m.precision),
                recall: weighted(|m| m.recall),
                f1: weighted(|m| m.f1),
                support: total,
            },
            accuracy: ratio(correct, total),
            classes,
        })
    }

    /// Classifies realized and predicted growth, then scores the labels.
    pub fn from_growth(actual: &[f64], predicted: &[f64]) -> EvalResult<Self> {
        let actual: Vec<u8> = actual.iter().map(|g| growth_class(*g)).collect();
        let predicted: Vec<u8> = predicted.iter().map(|g| growth_class(*g)).collect();
        Self::from_labels(&actual, &predicted)
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:>14} {:>9} {:>9} {:>9} {:>9}", "", "precision", "recall", "f1-score", "support")?;
        writeln!(f)?;
        for (label, m) in &self.classes {
            writeln!(
                f,
                "{:>14} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                label, m.precision, m.recall, m.f1, m.support
            )?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{:>14} {:>9} {:>9} {:>9.2} {:>9}",
            "accuracy", "", "", self.accuracy, self.macro_avg.support
        )?;
        for (name, m) in [("macro avg", &self.macro_avg), ("weighted avg", &self.weighted_avg)] {
            writeln!(
                f,
                "{:>14} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                name, m.precision, m.recall, m.f1, m.support
            )?;
        }
        Ok(())
    }
}

pub fn mean_squared_error(actual: &[f64], predicted: &[f64]) -> EvalResult<f64> {
    if actual.len() != predicted.len() || actual.is_empty() {
        return Err(EvaluationError::InvalidArgument(format!(
            "mean squared error needs two equal, non-empty series (got {} and {})",
            actual.len(),
            predicted.len()
        )));
    }
    let sum: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).powi(2))
        .sum();
    Ok(sum / actual.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    impl ClassificationReport {
        fn class(&self, label: u8) -> Option<&ClassMetrics> {
            self.classes.iter().find(|(l, _)| *l == label).map(|(_, m)| m)
        }
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn test_growth_class_boundary() {
        assert_eq!(growth_class(0.0), 1);
        assert_eq!(growth_class(-1e-9), 0);
        assert_eq!(growth_class(0.3), 1);
    }

    #[test]
    fn test_binary_report() {
        let actual = [1, 1, 1, 0, 0, 0];
        let predicted = [1, 1, 0, 0, 0, 1];
        let report = ClassificationReport::from_labels(&actual, &predicted).unwrap();

        let up = report.class(1).unwrap();
        assert!(close(up.precision, 2.0 / 3.0));
        assert!(close(up.recall, 2.0 / 3.0));
        assert_eq!(up.support, 3);
        assert!(close(report.accuracy, 4.0 / 6.0));
        assert!(close(report.macro_avg.f1, 2.0 / 3.0));
        assert_eq!(report.weighted_avg.support, 6);
    }

    #[test]
    fn test_class_never_predicted_scores_zero() {
        let report = ClassificationReport::from_labels(&[0, 1, 1], &[1, 1, 1]).unwrap();
        let down = report.class(0).unwrap();
        assert_eq!(down.precision, 0.0);
        assert_eq!(down.recall, 0.0);
        assert_eq!(down.f1, 0.0);
        assert!(close(report.class(1).unwrap().precision, 2.0 / 3.0));
    }

    #[test]
    fn test_single_class_report() {
        let report = ClassificationReport::from_growth(&[0.0, 0.0], &[0.0, 0.0]).unwrap();
        assert_eq!(report.classes.len(), 1);
        assert_eq!(report.accuracy, 1.0);
        assert_eq!(report.class(1).unwrap().f1, 1.0);
        let text = report.to_string();
        assert!(text.contains("precision"));
        assert!(text.contains("weighted avg"));
    }

    #[test]
    fn test_mse() {
        assert_eq!(mean_squared_error(&[0.0, 0.0], &[0.0, 0.0]).unwrap(), 0.0);
        assert!(close(mean_squared_error(&[1.0, 2.0], &[0.0, 4.0]).unwrap(), 2.5));
        assert!(mean_squared_error(&[1.0], &[]).is_err());
        assert!(mean_squared_error(&[], &[]).is_err());
    }
}
