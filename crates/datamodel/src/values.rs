//! Value types carried by time series: pairs, ensembles and missing values.

use crate::error::DataModelError;

/// A left value matched to a right value at one time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pair<L, R> {
    left: L,
    right: R,
}

impl<L, R> Pair<L, R> {
    /// Creates a pair.
    pub fn new(left: L, right: R) -> Self {
        Self { left, right }
    }

    /// Returns the left value.
    pub fn left(&self) -> &L {
        &self.left
    }

    /// Returns the right value.
    pub fn right(&self) -> &R {
        &self.right
    }

    /// Consumes the pair, returning `(left, right)`.
    pub fn into_parts(self) -> (L, R) {
        (self.left, self.right)
    }
}

/// An ensemble forecast value: one value per member.
#[derive(Debug, Clone, PartialEq)]
pub struct Ensemble {
    members: Vec<f64>,
    labels: Option<Vec<String>>,
}

impl Ensemble {
    /// Creates an unlabelled ensemble.
    pub fn new(members: Vec<f64>) -> Self {
        Self {
            members,
            labels: None,
        }
    }

    /// Creates a labelled ensemble.
    ///
    /// # Errors
    ///
    /// Returns [`DataModelError::LengthMismatch`] if there is not one label
    /// per member.
    pub fn with_labels(members: Vec<f64>, labels: Vec<String>) -> Result<Self, DataModelError> {
        if labels.len() != members.len() {
            return Err(DataModelError::LengthMismatch {
                field: "labels",
                expected: members.len(),
                got: labels.len(),
            });
        }
        Ok(Self {
            members,
            labels: Some(labels),
        })
    }

    /// Returns the member values.
    pub fn members(&self) -> &[f64] {
        &self.members
    }

    /// Returns the member labels, if any.
    pub fn labels(&self) -> Option<&[String]> {
        self.labels.as_deref()
    }

    /// Returns the number of members.
    pub fn size(&self) -> usize {
        self.members.len()
    }

    /// Returns the mean of the finite members, or NaN if there are none.
    pub fn mean(&self) -> f64 {
        let finite: Vec<f64> = self.members.iter().copied().filter(|m| m.is_finite()).collect();
        if finite.is_empty() {
            return f64::NAN;
        }
        finite.iter().sum::<f64>() / finite.len() as f64
    }

    /// Applies `f` to every member, keeping the labels.
    pub fn map_members(&self, f: impl Fn(f64) -> f64) -> Self {
        Self {
            members: self.members.iter().map(|&m| f(m)).collect(),
            labels: self.labels.clone(),
        }
    }
}

/// Values that can be missing.
pub trait MissingValue {
    /// Whether the value is missing or otherwise unusable.
    fn is_missing(&self) -> bool;
}

impl MissingValue for f64 {
    fn is_missing(&self) -> bool {
        !self.is_finite()
    }
}

impl MissingValue for Ensemble {
    fn is_missing(&self) -> bool {
        self.members.iter().all(|m| !m.is_finite())
    }
}

impl<L: MissingValue, R: MissingValue> MissingValue for Pair<L, R> {
    fn is_missing(&self) -> bool {
        self.left.is_missing() || self.right.is_missing()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensemble_mean_skips_missing() {
        let e = Ensemble::new(vec![1.0, f64::NAN, 3.0]);
        assert_eq!(e.mean(), 2.0);
        assert!(Ensemble::new(vec![f64::NAN]).mean().is_nan());
    }

    #[test]
    fn ensemble_missing_only_when_all_members_missing() {
        assert!(!Ensemble::new(vec![1.0, f64::NAN]).is_missing());
        assert!(Ensemble::new(vec![f64::NAN, f64::INFINITY]).is_missing());
    }

    #[test]
    fn labels_must_match_members() {
        let r = Ensemble::with_labels(vec![1.0, 2.0], vec!["a".to_string()]);
        assert!(matches!(
            r,
            Err(DataModelError::LengthMismatch {
                expected: 2,
                got: 1,
                ..
            })
        ));
    }

    #[test]
    fn pair_missing_if_either_side_missing() {
        assert!(Pair::new(1.0, f64::NAN).is_missing());
        assert!(!Pair::new(1.0, 2.0).is_missing());
    }
}
