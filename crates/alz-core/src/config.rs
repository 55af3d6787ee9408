use crate::features::SchemaId;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 进程级配置：启动时确定，运行期不变。
///
/// 阈值（分类 0.5 / 分级 0.4、0.6）不放在这里——它们随模型一起
/// 持久化在 model_dir/policy.json 里（见 runtime::Policy）。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// 当前进程服务的特征 schema（clinical / assessment）
    pub schema: SchemaId,

    /// 模型工件目录：forest.bin / scaler.bin / feature_schema.json / policy.json
    pub model_dir: PathBuf,

    /// 对外报告的 API 版本号
    pub version: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            schema: SchemaId::Clinical,
            model_dir: PathBuf::from("models/clinical"),
            version: "1.0.0".to_string(),
        }
    }
}
