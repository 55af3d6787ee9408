use crate::features::{FeatureSchema, SchemaId};
use crate::forest::RandomForestClassifier;
use crate::scaler::StandardScaler;
use crate::schema::RiskLevel;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

pub const FOREST_FILE: &str = "forest.bin";
pub const SCALER_FILE: &str = "scaler.bin";
pub const SCHEMA_FILE: &str = "feature_schema.json";
pub const POLICY_FILE: &str = "policy.json";

/// 阈值策略，随模型一起持久化。
///
/// class_threshold（二分类）和 tier_medium/tier_high（展示分级）是
/// 刻意独立的两套阈值：p=0.45 会得到 class 0 + "Medium"。不要合并。
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Policy {
    pub class_threshold: f32,
    pub tier_medium: f32,
    pub tier_high: f32,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            class_threshold: 0.5,
            tier_medium: 0.4,
            tier_high: 0.6,
        }
    }
}

impl Policy {
    #[inline]
    pub fn class_of(&self, p: f32) -> i32 {
        i32::from(p >= self.class_threshold)
    }

    #[inline]
    pub fn tier_of(&self, p: f32) -> RiskLevel {
        if p >= self.tier_high {
            RiskLevel::High
        } else if p >= self.tier_medium {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

/// 一套已训练模型工件的进程内形态：启动时从 model_dir 整体加载，
/// 之后只读。scaler 是可选的（assessment 模型没有）。
#[derive(Debug, Clone)]
pub struct ModelRuntime {
    pub model_dir: PathBuf,
    pub schema: FeatureSchema,
    pub scaler: Option<StandardScaler>,
    pub forest: RandomForestClassifier,
    pub policy: Policy,
}

impl ModelRuntime {
    /// 从 model_dir 加载并交叉核对：
    /// schema id 要和进程配置一致，森林的特征宽度要和 schema 一致。
    /// 宽度错位在推理时不会报错、只会悄悄算错，所以必须在这里拦。
    pub fn load_from_dir(dir: &Path, expect: SchemaId) -> Result<Self> {
        let schema_path = dir.join(SCHEMA_FILE);
        let s = fs::read_to_string(&schema_path)
            .with_context(|| format!("read {}", schema_path.display()))?;
        let schema: FeatureSchema = serde_json::from_str(&s)
            .with_context(|| format!("parse {}", schema_path.display()))?;

        if schema.id != expect {
            bail!(
                "model dir {} was fitted for schema {}, process is configured for {}",
                dir.display(),
                schema.id,
                expect
            );
        }

        let forest_path = dir.join(FOREST_FILE);
        let bytes = fs::read(&forest_path)
            .with_context(|| format!("read {}", forest_path.display()))?;
        let forest: RandomForestClassifier = bincode::deserialize(&bytes)
            .with_context(|| format!("parse {}", forest_path.display()))?;

        if !forest.is_fitted() {
            bail!("forest in {} has no trees", forest_path.display());
        }
        if forest.n_features() != schema.len() {
            bail!(
                "feature width mismatch: forest expects {}, schema {} has {}",
                forest.n_features(),
                schema.id,
                schema.len()
            );
        }

        let scaler_path = dir.join(SCALER_FILE);
        let scaler = if scaler_path.exists() {
            let bytes = fs::read(&scaler_path)
                .with_context(|| format!("read {}", scaler_path.display()))?;
            let scaler: StandardScaler = bincode::deserialize(&bytes)
                .with_context(|| format!("parse {}", scaler_path.display()))?;
            if scaler.columns.iter().any(|&c| c >= schema.len()) {
                bail!("scaler in {} references out-of-range columns", scaler_path.display());
            }
            Some(scaler)
        } else {
            None
        };

        let policy = load_policy(dir)?;

        Ok(Self {
            model_dir: dir.to_path_buf(),
            schema,
            scaler,
            forest,
            policy,
        })
    }

    pub fn save_to_dir(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;

        let bytes = bincode::serialize(&self.forest).context("serialize forest")?;
        fs::write(dir.join(FOREST_FILE), bytes)
            .with_context(|| format!("write {}", dir.join(FOREST_FILE).display()))?;

        if let Some(scaler) = &self.scaler {
            let bytes = bincode::serialize(scaler).context("serialize scaler")?;
            fs::write(dir.join(SCALER_FILE), bytes)
                .with_context(|| format!("write {}", dir.join(SCALER_FILE).display()))?;
        }

        let s = serde_json::to_string_pretty(&self.schema).context("serialize schema")?;
        fs::write(dir.join(SCHEMA_FILE), s)
            .with_context(|| format!("write {}", dir.join(SCHEMA_FILE).display()))?;

        let s = serde_json::to_string_pretty(&self.policy).context("serialize policy")?;
        fs::write(dir.join(POLICY_FILE), s)
            .with_context(|| format!("write {}", dir.join(POLICY_FILE).display()))?;

        Ok(())
    }

    /// validate 过后的请求 → 缩放后的特征 row
    pub fn build_row(&self, obj: &Map<String, Value>) -> Result<Vec<f32>> {
        let mut row = self.schema.encode_row(obj)?;
        if let Some(scaler) = &self.scaler {
            scaler.transform_row(&mut row);
        }
        Ok(row)
    }

    #[inline]
    pub fn predict_proba(&self, row: &[f32]) -> f32 {
        self.forest.predict_proba_row(row)
    }
}

fn load_policy(dir: &Path) -> Result<Policy> {
    let p = dir.join(POLICY_FILE);
    if !p.exists() {
        return Ok(Policy::default());
    }
    let s = fs::read_to_string(&p).with_context(|| format!("read {}", p.display()))?;
    let v: Policy = serde_json::from_str(&s).with_context(|| format!("parse {}", p.display()))?;
    Ok(v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_boundaries() {
        let policy = Policy::default();
        assert_eq!(policy.tier_of(0.6), RiskLevel::High);
        assert_eq!(policy.tier_of(0.599999), RiskLevel::Medium);
        assert_eq!(policy.tier_of(0.4), RiskLevel::Medium);
        assert_eq!(policy.tier_of(0.399999), RiskLevel::Low);
        assert_eq!(policy.tier_of(0.0), RiskLevel::Low);
        assert_eq!(policy.tier_of(1.0), RiskLevel::High);
    }

    #[test]
    fn test_class_boundary_independent_of_tiers() {
        let policy = Policy::default();
        assert_eq!(policy.class_of(0.5), 1);
        assert_eq!(policy.class_of(0.499999), 0);
        // 0.45：class 0 但档位 Medium——两套阈值互不耦合
        assert_eq!(policy.class_of(0.45), 0);
        assert_eq!(policy.tier_of(0.45), RiskLevel::Medium);
    }

    #[test]
    fn test_policy_file_roundtrip_and_default() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(load_policy(dir.path()), Ok(p) if p.class_threshold == 0.5));

        let custom = Policy {
            class_threshold: 0.7,
            tier_medium: 0.3,
            tier_high: 0.8,
        };
        fs::write(
            dir.path().join(POLICY_FILE),
            serde_json::to_string(&custom).unwrap(),
        )
        .unwrap();
        let back = load_policy(dir.path()).unwrap();
        assert_eq!(back.tier_high, 0.8);
    }

    #[test]
    fn test_load_rejects_schema_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let schema = FeatureSchema::clinical();
        fs::write(
            dir.path().join(SCHEMA_FILE),
            serde_json::to_string(&schema).unwrap(),
        )
        .unwrap();

        let err = ModelRuntime::load_from_dir(dir.path(), SchemaId::Assessment).unwrap_err();
        assert!(err.to_string().contains("schema"));
    }
}
