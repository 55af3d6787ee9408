use crate::dataset;
use crate::eval::{classification_report, ClassificationReport};
use crate::features::{FeatureSchema, SchemaId};
use crate::forest::RandomForestClassifier;
use crate::runtime::{ModelRuntime, Policy};
use crate::scaler::StandardScaler;
use anyhow::{ensure, Result};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::fmt;
use std::path::PathBuf;

/// 离线训练参数。超参默认值就是线上模型用的那组，
/// 改动它们要同时重训并重新发布工件。
#[derive(Debug, Clone)]
pub struct TrainParams {
    pub csv: PathBuf,
    pub out_dir: PathBuf,
    pub schema: SchemaId,
    pub label_column: String,
    pub test_size: f32,
    pub seed: u64,
    pub n_estimators: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
}

impl TrainParams {
    pub fn new(csv: PathBuf, out_dir: PathBuf, schema: SchemaId) -> Self {
        Self {
            csv,
            out_dir,
            schema,
            label_column: "Diagnosis".to_string(),
            test_size: 0.2,
            seed: 42,
            n_estimators: 200,
            max_depth: 15,
            min_samples_split: 5,
        }
    }
}

#[derive(Debug)]
pub struct TrainReport {
    pub n_rows: usize,
    pub n_train: usize,
    pub n_test: usize,
    pub out_dir: PathBuf,
    pub report: ClassificationReport,
}

impl fmt::Display for TrainReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "trained on {} rows ({} train / {} test), artifacts in {}",
            self.n_rows,
            self.n_train,
            self.n_test,
            self.out_dir.display()
        )?;
        writeln!(f)?;
        writeln!(f, "Model Performance:")?;
        write!(f, "{}", self.report)
    }
}

/// 整条离线流水线：CSV → 分层切分 → fit scaler → fit forest →
/// 留出集评估 → 落盘。给定同一份输入和种子，重复跑是幂等的。
pub fn run(params: &TrainParams) -> Result<TrainReport> {
    let schema = FeatureSchema::by_id(params.schema);
    let ds = dataset::load_csv(&params.csv, &schema, &params.label_column)?;
    tracing::info!(rows = ds.len(), schema = %params.schema, "loaded training data");

    let (train_idx, test_idx) = stratified_split(&ds.y, params.test_size, params.seed);
    ensure!(
        !train_idx.is_empty() && !test_idx.is_empty(),
        "dataset too small to split: {} rows",
        ds.len()
    );

    let take = |idx: &[usize]| -> (Vec<Vec<f32>>, Vec<u8>) {
        (
            idx.iter().map(|&i| ds.x[i].clone()).collect(),
            idx.iter().map(|&i| ds.y[i]).collect(),
        )
    };
    let (mut x_train, y_train) = take(&train_idx);
    let (mut x_test, y_test) = take(&test_idx);

    // scaler 只在训练折上 fit，再套到两边
    let scaler = StandardScaler::fit(&x_train, &schema.scaled_columns());
    scaler.transform(&mut x_train);
    scaler.transform(&mut x_test);

    let mut forest = RandomForestClassifier::new(params.n_estimators)
        .with_max_depth(params.max_depth)
        .with_min_samples_split(params.min_samples_split)
        .with_balanced_class_weights(true)
        .with_random_state(params.seed);
    forest.fit(&x_train, &y_train)?;

    let y_pred = forest.predict(&x_test);
    let report = classification_report(&y_pred, &y_test);
    tracing::info!(
        accuracy = report.accuracy,
        f1_pos = report.classes[1].f1,
        "held-out evaluation done"
    );

    let rt = ModelRuntime {
        model_dir: params.out_dir.clone(),
        schema,
        scaler: Some(scaler),
        forest,
        policy: Policy::default(),
    };
    rt.save_to_dir(&params.out_dir)?;
    tracing::info!(out_dir = %params.out_dir.display(), "artifacts saved");

    Ok(TrainReport {
        n_rows: ds.len(),
        n_train: train_idx.len(),
        n_test: test_idx.len(),
        out_dir: params.out_dir.clone(),
        report,
    })
}

/// 按标签分层的随机切分：每个类内部先种子洗牌，再各取
/// test_size 比例进测试集。返回 (train, test) 下标。
fn stratified_split(y: &[u8], test_size: f32, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    let mut train = Vec::new();
    let mut test = Vec::new();

    for class in [0u8, 1u8] {
        let mut idx: Vec<usize> = y
            .iter()
            .enumerate()
            .filter(|(_, &c)| c == class)
            .map(|(i, _)| i)
            .collect();
        idx.shuffle(&mut rng);

        let n_test = (idx.len() as f32 * test_size).round() as usize;
        test.extend_from_slice(&idx[..n_test]);
        train.extend_from_slice(&idx[n_test..]);
    }

    train.sort_unstable();
    test.sort_unstable();
    (train, test)
}
