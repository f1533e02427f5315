//! Categorical encoding contract shared by training and prediction

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::features::{CATEGORICAL_FEATURES, NUMERIC_FEATURE_COUNT};
use crate::models::FeatureRow;

use super::tree::FeatureVector;
use super::FEATURE_COUNT;

/// Per-column vocabularies learned from the training rows.
///
/// A value's code is its index in the sorted vocabulary. Values never seen
/// in training encode as NaN, which no categorical split sends left.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoricalEncoder {
    vocabularies: Vec<Vec<String>>,
}

impl CategoricalEncoder {
    pub fn fit(rows: &[FeatureRow]) -> Self {
        let mut sets: Vec<BTreeSet<&str>> = vec![BTreeSet::new(); CATEGORICAL_FEATURES.len()];
        for row in rows {
            for (set, value) in sets.iter_mut().zip(row.categorical_values()) {
                set.insert(value);
            }
        }
        Self {
            vocabularies: sets
                .into_iter()
                .map(|set| set.into_iter().map(str::to_string).collect())
                .collect(),
        }
    }

    pub fn code(&self, column: usize, value: &str) -> Option<usize> {
        self.vocabularies
            .get(column)?
            .binary_search_by(|probe| probe.as_str().cmp(value))
            .ok()
    }

    pub fn vocabulary(&self, column: usize) -> &[String] {
        self.vocabularies
            .get(column)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn encode(&self, row: &FeatureRow) -> FeatureVector {
        let mut x = [0.0; FEATURE_COUNT];
        x[..NUMERIC_FEATURE_COUNT].copy_from_slice(&row.numeric_values());
        for (column, value) in row.categorical_values().into_iter().enumerate() {
            x[NUMERIC_FEATURE_COUNT + column] = self
                .code(column, value)
                .map(|c| c as f64)
                .unwrap_or(f64::NAN);
        }
        x
    }
}
