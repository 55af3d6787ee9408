use crate::util::clamp01;
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// CART 二分类树节点。Leaf 里直接存加权正类占比，
/// 推理就是一条 root→leaf 的路径，无分配、确定性。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    Split {
        feature: usize,
        threshold: f32,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
    Leaf {
        proba: f32,
        n_samples: usize,
    },
}

impl TreeNode {
    pub fn depth(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 0,
            TreeNode::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    root: TreeNode,
}

impl DecisionTree {
    pub fn predict_proba_row(&self, row: &[f32]) -> f32 {
        let mut node = &self.root;
        loop {
            match node {
                TreeNode::Leaf { proba, .. } => return *proba,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if row[*feature] <= *threshold { left } else { right };
                }
            }
        }
    }

    pub fn depth(&self) -> usize {
        self.root.depth()
    }
}

/// 随机森林二分类器。
///
/// - 每棵树在一份 bootstrap 采样上训练（有放回，种子 = random_state + i）
/// - class_weight=balanced 时按 n / (2 * count_c) 给样本加权，
///   不平衡数据不会被多数类淹没
/// - predict_proba 是各树叶子正类占比的平均，给定输入和已训练
///   模型是确定性的（随机性只存在于训练期）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForestClassifier {
    trees: Vec<DecisionTree>,
    n_estimators: usize,
    max_depth: Option<usize>,
    min_samples_split: usize,
    balanced: bool,
    random_state: Option<u64>,
    n_features: usize,
}

impl RandomForestClassifier {
    pub fn new(n_estimators: usize) -> Self {
        Self {
            trees: Vec::new(),
            n_estimators,
            max_depth: None,
            min_samples_split: 2,
            balanced: false,
            random_state: None,
            n_features: 0,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = Some(max_depth);
        self
    }

    pub fn with_min_samples_split(mut self, min_samples_split: usize) -> Self {
        self.min_samples_split = min_samples_split.max(2);
        self
    }

    pub fn with_balanced_class_weights(mut self, balanced: bool) -> Self {
        self.balanced = balanced;
        self
    }

    pub fn with_random_state(mut self, random_state: u64) -> Self {
        self.random_state = Some(random_state);
        self
    }

    pub fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_estimators(&self) -> usize {
        self.n_estimators
    }

    pub fn fit(&mut self, x: &[Vec<f32>], y: &[u8]) -> Result<()> {
        if x.is_empty() || x.len() != y.len() {
            bail!("fit needs non-empty x/y of equal length (x={}, y={})", x.len(), y.len());
        }
        let n_features = x[0].len();
        if x.iter().any(|r| r.len() != n_features) {
            bail!("ragged feature matrix");
        }

        let n = x.len();
        let n_pos = y.iter().filter(|&&c| c == 1).count();
        let n_neg = n - n_pos;
        if n_pos == 0 || n_neg == 0 {
            bail!("training labels contain a single class, cannot fit a classifier");
        }

        // class_weight='balanced': w_c = n / (n_classes * count_c)
        let (w_neg, w_pos) = if self.balanced {
            (n as f32 / (2.0 * n_neg as f32), n as f32 / (2.0 * n_pos as f32))
        } else {
            (1.0, 1.0)
        };
        let w: Vec<f32> = y.iter().map(|&c| if c == 1 { w_pos } else { w_neg }).collect();

        self.n_features = n_features;
        self.trees = Vec::with_capacity(self.n_estimators);

        let builder = TreeBuilder {
            x,
            y,
            w: &w,
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
        };

        for i in 0..self.n_estimators {
            let seed = self.random_state.map(|s| s + i as u64);
            let indices = bootstrap_sample(n, seed);
            let root = builder.build(&indices, 0);
            self.trees.push(DecisionTree { root });
        }

        Ok(())
    }

    pub fn predict_proba_row(&self, row: &[f32]) -> f32 {
        if self.trees.is_empty() {
            return 0.0;
        }
        let sum: f32 = self.trees.iter().map(|t| t.predict_proba_row(row)).sum();
        clamp01(sum / self.trees.len() as f32)
    }

    pub fn predict_row(&self, row: &[f32]) -> u8 {
        u8::from(self.predict_proba_row(row) >= 0.5)
    }

    pub fn predict(&self, x: &[Vec<f32>]) -> Vec<u8> {
        x.iter().map(|r| self.predict_row(r)).collect()
    }
}

struct TreeBuilder<'a> {
    x: &'a [Vec<f32>],
    y: &'a [u8],
    w: &'a [f32],
    max_depth: Option<usize>,
    min_samples_split: usize,
}

impl TreeBuilder<'_> {
    fn build(&self, idx: &[usize], depth: usize) -> TreeNode {
        let (w_total, w_pos) = self.weight_sums(idx);
        let proba = if w_total > 0.0 { w_pos / w_total } else { 0.0 };

        let depth_reached = self.max_depth.map(|d| depth >= d).unwrap_or(false);
        let pure = proba == 0.0 || proba == 1.0;
        if depth_reached || pure || idx.len() < self.min_samples_split {
            return self.leaf(proba, idx.len());
        }

        match self.best_split(idx, w_total, w_pos) {
            None => self.leaf(proba, idx.len()),
            Some((feature, threshold)) => {
                let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = idx
                    .iter()
                    .copied()
                    .partition(|&i| self.x[i][feature] <= threshold);
                if left_idx.is_empty() || right_idx.is_empty() {
                    return self.leaf(proba, idx.len());
                }
                TreeNode::Split {
                    feature,
                    threshold,
                    left: Box::new(self.build(&left_idx, depth + 1)),
                    right: Box::new(self.build(&right_idx, depth + 1)),
                }
            }
        }
    }

    fn leaf(&self, proba: f32, n_samples: usize) -> TreeNode {
        TreeNode::Leaf { proba, n_samples }
    }

    fn weight_sums(&self, idx: &[usize]) -> (f32, f32) {
        let mut w_total = 0.0;
        let mut w_pos = 0.0;
        for &i in idx {
            w_total += self.w[i];
            if self.y[i] == 1 {
                w_pos += self.w[i];
            }
        }
        (w_total, w_pos)
    }

    /// 逐特征排序 + 前缀和扫描，在相邻不同取值的中点取候选阈值，
    /// 取加权 Gini 最小的切分。特征按下标顺序遍历、严格更优才替换，
    /// 结果是确定性的。
    fn best_split(&self, idx: &[usize], w_total: f32, w_pos: f32) -> Option<(usize, f32)> {
        let n_features = self.x[idx[0]].len();
        let parent = gini(w_pos, w_total);

        let mut best_score = parent;
        let mut best: Option<(usize, f32)> = None;

        let mut order: Vec<usize> = Vec::with_capacity(idx.len());
        for feature in 0..n_features {
            order.clear();
            order.extend_from_slice(idx);
            order.sort_by(|&a, &b| {
                self.x[a][feature]
                    .partial_cmp(&self.x[b][feature])
                    .unwrap_or(Ordering::Equal)
            });

            let mut wl = 0.0;
            let mut wl_pos = 0.0;
            for k in 0..order.len() - 1 {
                let i = order[k];
                wl += self.w[i];
                if self.y[i] == 1 {
                    wl_pos += self.w[i];
                }

                let v = self.x[i][feature];
                let v_next = self.x[order[k + 1]][feature];
                if v == v_next {
                    continue;
                }

                let wr = w_total - wl;
                let wr_pos = w_pos - wl_pos;
                let score = (wl * gini(wl_pos, wl) + wr * gini(wr_pos, wr)) / w_total;
                if score + 1e-10 < best_score {
                    best_score = score;
                    best = Some((feature, (v + v_next) / 2.0));
                }
            }
        }

        best
    }
}

#[inline]
fn gini(w_pos: f32, w_total: f32) -> f32 {
    if w_total <= 0.0 {
        return 0.0;
    }
    let p = w_pos / w_total;
    2.0 * p * (1.0 - p)
}

fn bootstrap_sample(n_samples: usize, random_state: Option<u64>) -> Vec<usize> {
    use rand::distributions::{Distribution, Uniform};
    use rand::SeedableRng;

    let dist = Uniform::from(0..n_samples);
    let mut indices = Vec::with_capacity(n_samples);

    if let Some(seed) = random_state {
        let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
        for _ in 0..n_samples {
            indices.push(dist.sample(&mut rng));
        }
    } else {
        let mut rng = rand::thread_rng();
        for _ in 0..n_samples {
            indices.push(dist.sample(&mut rng));
        }
    }

    indices
}
