//! Regression trees fitted to absolute-error gradients
//!
//! Splits are chosen on the sign gradients of the L1 loss (squared gradient
//! sum over count, as for any first-order gradient booster); leaves then
//! store the median residual of the rows that reached them, scaled by the
//! learning rate.

use serde::{Deserialize, Serialize};

use super::FEATURE_COUNT;

/// An encoded feature vector (categorical columns hold vocabulary codes)
pub type FeatureVector = [f64; FEATURE_COUNT];

/// Growth limits for a single tree
#[derive(Debug, Clone, Copy)]
pub struct TreeParams {
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    /// Multiplier applied to every leaf value
    pub shrinkage: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SplitRule {
    /// Left when `x <= threshold`
    Threshold { threshold: f64 },
    /// Left when `x == code`; unknown categories always go right
    Category { code: f64 },
}

impl SplitRule {
    fn goes_left(&self, x: f64) -> bool {
        match *self {
            SplitRule::Threshold { threshold } => x <= threshold,
            SplitRule::Category { code } => x == code,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        rule: SplitRule,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

struct Candidate {
    feature: usize,
    rule: SplitRule,
    gain: f64,
}

/// Borrowed training state for one tree
struct Builder<'a> {
    features: &'a [FeatureVector],
    gradients: &'a [f64],
    residuals: &'a [f64],
    allowed: &'a [usize],
    categorical: &'a [bool; FEATURE_COUNT],
    params: TreeParams,
    nodes: Vec<Node>,
}

impl RegressionTree {
    /// Fit a tree on the rows listed in `rows`, using only `allowed` features
    pub fn fit(
        features: &[FeatureVector],
        gradients: &[f64],
        residuals: &[f64],
        rows: Vec<usize>,
        allowed: &[usize],
        categorical: &[bool; FEATURE_COUNT],
        params: TreeParams,
    ) -> Self {
        let mut builder = Builder {
            features,
            gradients,
            residuals,
            allowed,
            categorical,
            params,
            nodes: Vec::new(),
        };
        builder.grow(rows, 0);
        Self {
            nodes: builder.nodes,
        }
    }

    pub fn predict(&self, x: &FeatureVector) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    rule,
                    left,
                    right,
                } => {
                    idx = if rule.goes_left(x[*feature]) {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    /// Check the node graph of a deserialized tree.
    ///
    /// Children must come after their parent and stay in bounds, which also
    /// rules out cycles; split features must exist in the feature vector.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".to_string());
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            if let Node::Split {
                feature,
                left,
                right,
                ..
            } = node
            {
                if *feature >= FEATURE_COUNT {
                    return Err(format!("node {} splits on unknown feature {}", idx, feature));
                }
                for child in [*left, *right] {
                    if child <= idx || child >= self.nodes.len() {
                        return Err(format!("node {} points to invalid child {}", idx, child));
                    }
                }
            }
        }
        Ok(())
    }

    pub fn leaf_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }
}

impl Builder<'_> {
    /// Grow a subtree and return the index of its root
    fn grow(&mut self, rows: Vec<usize>, depth: usize) -> usize {
        let can_split =
            depth < self.params.max_depth && rows.len() >= 2 * self.params.min_samples_leaf.max(1);

        let best = if can_split {
            self.best_split(&rows)
        } else {
            None
        };

        let Some(best) = best else {
            return self.leaf(&rows);
        };

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .into_iter()
            .partition(|&r| best.rule.goes_left(self.features[r][best.feature]));

        // Reserve the slot so children land after their parent
        let idx = self.nodes.len();
        self.nodes.push(Node::Leaf { value: 0.0 });
        let left = self.grow(left_rows, depth + 1);
        let right = self.grow(right_rows, depth + 1);
        self.nodes[idx] = Node::Split {
            feature: best.feature,
            rule: best.rule,
            left,
            right,
        };
        idx
    }

    fn leaf(&mut self, rows: &[usize]) -> usize {
        let mut residuals: Vec<f64> = rows.iter().map(|&r| self.residuals[r]).collect();
        let value = median(&mut residuals).unwrap_or(0.0) * self.params.shrinkage;
        self.nodes.push(Node::Leaf { value });
        self.nodes.len() - 1
    }

    fn best_split(&self, rows: &[usize]) -> Option<Candidate> {
        let total_grad: f64 = rows.iter().map(|&r| self.gradients[r]).sum();
        let parent_score = total_grad * total_grad / rows.len() as f64;

        let mut best: Option<Candidate> = None;
        for &feature in self.allowed {
            let candidate = if self.categorical[feature] {
                self.best_category_split(rows, feature, total_grad)
            } else {
                self.best_threshold_split(rows, feature, total_grad)
            };
            if let Some((rule, score)) = candidate {
                let gain = score - parent_score;
                // Strict comparison keeps the lowest feature index on ties
                if gain > 1e-12 && best.as_ref().map_or(true, |b| gain > b.gain) {
                    best = Some(Candidate {
                        feature,
                        rule,
                        gain,
                    });
                }
            }
        }
        best
    }

    fn best_threshold_split(
        &self,
        rows: &[usize],
        feature: usize,
        total_grad: f64,
    ) -> Option<(SplitRule, f64)> {
        let min_leaf = self.params.min_samples_leaf.max(1);
        let mut pairs: Vec<(f64, f64)> = rows
            .iter()
            .map(|&r| (self.features[r][feature], self.gradients[r]))
            .collect();
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

        let n = pairs.len();
        let mut left_grad = 0.0;
        let mut best: Option<(SplitRule, f64)> = None;
        for i in 0..n.saturating_sub(1) {
            left_grad += pairs[i].1;
            let left_n = i + 1;
            let right_n = n - left_n;
            if left_n < min_leaf || right_n < min_leaf {
                continue;
            }
            if pairs[i].0 == pairs[i + 1].0 {
                continue;
            }
            let right_grad = total_grad - left_grad;
            let score =
                left_grad * left_grad / left_n as f64 + right_grad * right_grad / right_n as f64;
            if best.as_ref().map_or(true, |(_, s)| score > *s) {
                let threshold = (pairs[i].0 + pairs[i + 1].0) / 2.0;
                best = Some((SplitRule::Threshold { threshold }, score));
            }
        }
        best
    }

    fn best_category_split(
        &self,
        rows: &[usize],
        feature: usize,
        total_grad: f64,
    ) -> Option<(SplitRule, f64)> {
        let min_leaf = self.params.min_samples_leaf.max(1);
        // (code, gradient sum, count), ordered by code for stable tie-breaks
        let mut stats: Vec<(f64, f64, usize)> = Vec::new();
        for &r in rows {
            let code = self.features[r][feature];
            if code.is_nan() {
                continue;
            }
            match stats.iter_mut().find(|(c, _, _)| *c == code) {
                Some(entry) => {
                    entry.1 += self.gradients[r];
                    entry.2 += 1;
                }
                None => stats.push((code, self.gradients[r], 1)),
            }
        }
        stats.sort_by(|a, b| a.0.total_cmp(&b.0));

        let n = rows.len();
        let mut best: Option<(SplitRule, f64)> = None;
        for (code, grad, count) in stats {
            let rest = n - count;
            if count < min_leaf || rest < min_leaf {
                continue;
            }
            let rest_grad = total_grad - grad;
            let score = grad * grad / count as f64 + rest_grad * rest_grad / rest as f64;
            if best.as_ref().map_or(true, |(_, s)| score > *s) {
                best = Some((SplitRule::Category { code }, score));
            }
        }
        best
    }
}

/// Median of the values (reorders the slice), `None` when empty
pub fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}
