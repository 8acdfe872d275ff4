//! Bagged CART forests over encoded categorical features.
//!
//! The classifier splits on Gini impurity and averages leaf class
//! distributions; the regressor splits on variance and averages leaf means.
//! Each tree is grown on a bootstrap sample drawn from a generator seeded with
//! `seed + tree_index`, so a fixed seed reproduces the same forest.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ForestError {
    #[error("cannot fit with zero samples")]
    EmptyTrainingSet,

    #[error("{samples} samples but {targets} targets")]
    LengthMismatch { samples: usize, targets: usize },

    #[error("sample {row} has {found} features, expected {expected}")]
    RaggedFeatures {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("label {label} is outside {n_classes} classes")]
    LabelOutOfRange { label: usize, n_classes: usize },
}

/// How many candidate features each split considers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaxFeatures {
    All,
    Sqrt,
}

impl MaxFeatures {
    fn resolve(&self, n_features: usize) -> usize {
        match self {
            MaxFeatures::All => n_features,
            MaxFeatures::Sqrt => ((n_features as f64).sqrt() as usize).max(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: None,
            min_samples_split: 2,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone)]
enum Node<L> {
    Leaf(L),
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone)]
struct Tree<L> {
    nodes: Vec<Node<L>>,
}

impl<L> Tree<L> {
    fn leaf_for(&self, row: &[f64]) -> &L {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf(leaf) => return leaf,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if row[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }
}

/// Impurity measure and leaf summary for one target type
trait Criterion {
    type Leaf;

    fn impurity(&self, samples: &[usize]) -> f64;
    fn leaf(&self, samples: &[usize]) -> Self::Leaf;
}

struct Gini<'a> {
    labels: &'a [usize],
    n_classes: usize,
}

impl Gini<'_> {
    fn distribution(&self, samples: &[usize]) -> Vec<f64> {
        let mut counts = vec![0.0; self.n_classes];
        for &s in samples {
            counts[self.labels[s]] += 1.0;
        }
        let total = samples.len() as f64;
        if total > 0.0 {
            for c in &mut counts {
                *c /= total;
            }
        }
        counts
    }
}

impl Criterion for Gini<'_> {
    type Leaf = Vec<f64>;

    fn impurity(&self, samples: &[usize]) -> f64 {
        if samples.is_empty() {
            return 0.0;
        }
        1.0 - self.distribution(samples).iter().map(|p| p * p).sum::<f64>()
    }

    fn leaf(&self, samples: &[usize]) -> Vec<f64> {
        self.distribution(samples)
    }
}

struct Variance<'a> {
    targets: &'a [f64],
}

impl Variance<'_> {
    fn mean(&self, samples: &[usize]) -> f64 {
        if samples.is_empty() {
            return 0.0;
        }
        samples.iter().map(|&s| self.targets[s]).sum::<f64>() / samples.len() as f64
    }
}

impl Criterion for Variance<'_> {
    type Leaf = f64;

    fn impurity(&self, samples: &[usize]) -> f64 {
        if samples.is_empty() {
            return 0.0;
        }
        let mean = self.mean(samples);
        samples
            .iter()
            .map(|&s| (self.targets[s] - mean).powi(2))
            .sum::<f64>()
            / samples.len() as f64
    }

    fn leaf(&self, samples: &[usize]) -> f64 {
        self.mean(samples)
    }
}

struct TreeGrower<'a, C: Criterion> {
    x: &'a [Vec<f64>],
    criterion: C,
    max_depth: Option<usize>,
    min_samples_split: usize,
    max_features: usize,
    nodes: Vec<Node<C::Leaf>>,
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    impurity: f64,
}

impl<'a, C: Criterion> TreeGrower<'a, C> {
    fn grow(mut self, samples: Vec<usize>, rng: &mut StdRng) -> Tree<C::Leaf> {
        self.grow_node(samples, 0, rng);
        Tree { nodes: self.nodes }
    }

    fn grow_node(&mut self, samples: Vec<usize>, depth: usize, rng: &mut StdRng) -> usize {
        let idx = self.nodes.len();
        self.nodes.push(Node::Leaf(self.criterion.leaf(&samples)));

        let depth_reached = self.max_depth.map_or(false, |max| depth >= max);
        if depth_reached || samples.len() < self.min_samples_split {
            return idx;
        }

        let parent_impurity = self.criterion.impurity(&samples);
        if parent_impurity <= f64::EPSILON {
            return idx;
        }

        let Some(split) = self.best_split(&samples, rng) else {
            return idx;
        };
        if split.impurity >= parent_impurity - 1e-12 {
            return idx;
        }

        let (left_samples, right_samples): (Vec<usize>, Vec<usize>) = samples
            .iter()
            .partition(|&&s| self.x[s][split.feature] <= split.threshold);

        let left = self.grow_node(left_samples, depth + 1, rng);
        let right = self.grow_node(right_samples, depth + 1, rng);
        self.nodes[idx] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        idx
    }

    fn best_split(&self, samples: &[usize], rng: &mut StdRng) -> Option<BestSplit> {
        let n_features = self.x[0].len();
        // Visit features in random order; constant features don't count toward max_features
        let order = rand::seq::index::sample(rng, n_features, n_features);

        let mut best: Option<BestSplit> = None;
        let mut visited = 0;
        let total = samples.len() as f64;

        for feature in order.iter() {
            if visited >= self.max_features {
                break;
            }

            let mut values: Vec<f64> = samples.iter().map(|&s| self.x[s][feature]).collect();
            values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            values.dedup();
            if values.len() < 2 {
                continue;
            }
            visited += 1;

            for pair in values.windows(2) {
                let threshold = (pair[0] + pair[1]) / 2.0;
                let (left, right): (Vec<usize>, Vec<usize>) = samples
                    .iter()
                    .partition(|&&s| self.x[s][feature] <= threshold);

                let weighted = (left.len() as f64 * self.criterion.impurity(&left)
                    + right.len() as f64 * self.criterion.impurity(&right))
                    / total;

                if best.as_ref().map_or(true, |b| weighted < b.impurity) {
                    best = Some(BestSplit {
                        feature,
                        threshold,
                        impurity: weighted,
                    });
                }
            }
        }

        best
    }
}

fn validate_shape(x: &[Vec<f64>], n_targets: usize) -> Result<usize, ForestError> {
    if x.is_empty() {
        return Err(ForestError::EmptyTrainingSet);
    }
    if x.len() != n_targets {
        return Err(ForestError::LengthMismatch {
            samples: x.len(),
            targets: n_targets,
        });
    }
    let n_features = x[0].len();
    for (row, sample) in x.iter().enumerate() {
        if sample.len() != n_features {
            return Err(ForestError::RaggedFeatures {
                row,
                expected: n_features,
                found: sample.len(),
            });
        }
    }
    Ok(n_features)
}

fn bootstrap_sample(n_samples: usize, rng: &mut StdRng) -> Vec<usize> {
    (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect()
}

/// Random forest over `n_classes` labels `0..n_classes`
#[derive(Debug, Clone)]
pub struct RandomForestClassifier {
    trees: Vec<Tree<Vec<f64>>>,
    n_classes: usize,
    n_features: usize,
}

impl RandomForestClassifier {
    pub fn fit(
        params: &ForestParams,
        x: &[Vec<f64>],
        y: &[usize],
        n_classes: usize,
    ) -> Result<Self, ForestError> {
        let n_features = validate_shape(x, y.len())?;
        if let Some(&label) = y.iter().find(|&&label| label >= n_classes) {
            return Err(ForestError::LabelOutOfRange { label, n_classes });
        }

        let max_features = MaxFeatures::Sqrt.resolve(n_features);
        let trees = (0..params.n_estimators.max(1))
            .map(|i| {
                let mut rng = StdRng::seed_from_u64(params.seed.wrapping_add(i as u64));
                let samples = bootstrap_sample(x.len(), &mut rng);
                TreeGrower {
                    x,
                    criterion: Gini { labels: y, n_classes },
                    max_depth: params.max_depth,
                    min_samples_split: params.min_samples_split.max(2),
                    max_features,
                    nodes: Vec::new(),
                }
                .grow(samples, &mut rng)
            })
            .collect();

        Ok(Self {
            trees,
            n_classes,
            n_features,
        })
    }

    /// Class probabilities for one sample; entries sum to 1
    pub fn predict_proba(&self, row: &[f64]) -> Vec<f64> {
        let mut proba = vec![0.0; self.n_classes];
        for tree in &self.trees {
            for (p, leaf_p) in proba.iter_mut().zip(tree.leaf_for(row)) {
                *p += leaf_p;
            }
        }
        let n_trees = self.trees.len() as f64;
        for p in &mut proba {
            *p /= n_trees;
        }
        proba
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }
}

/// Random forest regressor averaging per-tree leaf means
#[derive(Debug, Clone)]
pub struct RandomForestRegressor {
    trees: Vec<Tree<f64>>,
    n_features: usize,
}

impl RandomForestRegressor {
    pub fn fit(params: &ForestParams, x: &[Vec<f64>], y: &[f64]) -> Result<Self, ForestError> {
        let n_features = validate_shape(x, y.len())?;

        let max_features = MaxFeatures::All.resolve(n_features);
        let trees = (0..params.n_estimators.max(1))
            .map(|i| {
                let mut rng = StdRng::seed_from_u64(params.seed.wrapping_add(i as u64));
                let samples = bootstrap_sample(x.len(), &mut rng);
                TreeGrower {
                    x,
                    criterion: Variance { targets: y },
                    max_depth: params.max_depth,
                    min_samples_split: params.min_samples_split.max(2),
                    max_features,
                    nodes: Vec::new(),
                }
                .grow(samples, &mut rng)
            })
            .collect();

        Ok(Self { trees, n_features })
    }

    pub fn predict(&self, row: &[f64]) -> f64 {
        let sum: f64 = self.trees.iter().map(|tree| *tree.leaf_for(row)).sum();
        sum / self.trees.len() as f64
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }
}
