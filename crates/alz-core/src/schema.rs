// crates/alz-core/src/schema.rs
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 概率分级后的风险档位（仅用于展示；与二分类阈值相互独立）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// 单次请求的推理结果：派生值，不落盘
#[derive(Debug, Clone, Serialize)]
pub struct RiskAssessment {
    pub probability: f32,
    pub class: i32,
    pub level: RiskLevel,
    /// 输入里取值为 true 的布尔风险因子名（Gender 除外）
    pub risk_factors: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictResponse {
    pub prediction: f64,
    pub risk_class: i32,
    pub risk_level: RiskLevel,
    pub status: String,
    pub risk_factors: Vec<String>,
}

impl PredictResponse {
    pub fn from_assessment(a: &RiskAssessment) -> Self {
        Self {
            prediction: a.probability as f64,
            risk_class: a.class,
            risk_level: a.level,
            status: "success".to_string(),
            risk_factors: a.risk_factors.clone(),
        }
    }
}

/// assessment schema 的精简响应：只有概率，没有分级
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreResponse {
    pub prediction: f64,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    pub message: String,
    pub model_status: String,
    pub available_endpoints: serde_json::Value,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub status: String,
}

impl ErrorBody {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            error: msg.into(),
            status: "error".to_string(),
        }
    }
}

/// 请求路径上的错误分类。
///
/// HTTP 状态码的映射按 schema 不同而不同（clinical 的校验错误走 500，
/// 这是对上游契约的保留，见 DESIGN.md），所以这里只分类、不定码。
#[derive(Debug, Error)]
pub enum PredictError {
    #[error("No data provided")]
    MissingBody,

    #[error("{0}")]
    Validation(String),

    #[error("Missing required features: {}", .0.join(", "))]
    MissingFields(Vec<String>),

    #[error("model not ready")]
    NotReady,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_level_wire_format() {
        assert_eq!(serde_json::to_string(&RiskLevel::High).unwrap(), "\"High\"");
        assert_eq!(serde_json::to_string(&RiskLevel::Low).unwrap(), "\"Low\"");
    }

    #[test]
    fn test_predict_response_shape() {
        let a = RiskAssessment {
            probability: 0.72,
            class: 1,
            level: RiskLevel::High,
            risk_factors: vec!["MemoryComplaints".to_string()],
        };
        let v = serde_json::to_value(PredictResponse::from_assessment(&a)).unwrap();
        assert!((v["prediction"].as_f64().unwrap() - 0.72).abs() < 1e-6);
        assert_eq!(v["risk_class"], 1);
        assert_eq!(v["risk_level"], "High");
        assert_eq!(v["status"], "success");
        assert_eq!(v["risk_factors"][0], "MemoryComplaints");
    }

    #[test]
    fn test_missing_fields_message_lists_names() {
        let e = PredictError::MissingFields(vec!["MMSE".to_string(), "BMI".to_string()]);
        assert_eq!(e.to_string(), "Missing required features: MMSE, BMI");
    }
}
