use crate::config::Config;
use crate::features::{risk_factors, SchemaId};
use crate::runtime::ModelRuntime;
use crate::schema::{PredictError, RiskAssessment};
use crate::util::now_us;
use crate::validate::{check_required, validate_clinical};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Instant;

/// 进程级请求核心：配置 + 只读模型。
///
/// 模型在进入服务循环之前构造一次、从此不变；请求处理方从这里
/// 注入拿到它，而不是读全局可变量。工件缺失时进程照常起来，
/// runtime 为 None，predict 统一回 NotReady（由 server 映射 503）。
#[derive(Clone)]
pub struct AppCore {
    pub cfg: Config,
    runtime: Option<Arc<ModelRuntime>>,
}

impl AppCore {
    pub fn new(cfg: Config, runtime: Option<Arc<ModelRuntime>>) -> Self {
        Self { cfg, runtime }
    }

    /// 硬加载：工件必须在位（训练后验证、测试用）
    pub fn load(cfg: Config) -> anyhow::Result<Self> {
        let rt = ModelRuntime::load_from_dir(&cfg.model_dir, cfg.schema)?;
        Ok(Self {
            cfg,
            runtime: Some(Arc::new(rt)),
        })
    }

    /// 宽加载：加载失败只告警，服务以 not-ready 状态启动
    pub fn load_or_empty(cfg: Config) -> Self {
        match ModelRuntime::load_from_dir(&cfg.model_dir, cfg.schema) {
            Ok(rt) => {
                tracing::info!(
                    model_dir = %cfg.model_dir.display(),
                    schema = %cfg.schema,
                    trees = rt.forest.n_estimators(),
                    "model loaded"
                );
                Self {
                    cfg,
                    runtime: Some(Arc::new(rt)),
                }
            }
            Err(e) => {
                tracing::warn!(
                    model_dir = %cfg.model_dir.display(),
                    err = %format!("{e:#}"),
                    "model not loaded, serving not-ready"
                );
                Self { cfg, runtime: None }
            }
        }
    }

    pub fn model_loaded(&self) -> bool {
        self.runtime.is_some()
    }

    pub fn runtime(&self) -> Option<&Arc<ModelRuntime>> {
        self.runtime.as_ref()
    }

    /// 单请求全链路：validate → encode/scale → predict → tier。
    /// 同步走完，没有挂起点；任何错误中止本次请求，不重试。
    pub fn predict(&self, data: &mut Map<String, Value>) -> Result<RiskAssessment, PredictError> {
        metrics::counter!("predict_requests_total").increment(1);
        let t0 = Instant::now();

        let out = self.predict_inner(data, t0);
        if out.is_err() {
            metrics::counter!("predict_errors_total").increment(1);
        }
        out
    }

    fn predict_inner(
        &self,
        data: &mut Map<String, Value>,
        t0: Instant,
    ) -> Result<RiskAssessment, PredictError> {
        let rt = match &self.runtime {
            Some(rt) => rt,
            None => {
                metrics::counter!("model_not_ready_total").increment(1);
                return Err(PredictError::NotReady);
            }
        };

        // validate（clinical 有范围校验和 Gender 归一；assessment 是全字段必填）
        let t_val = Instant::now();
        match rt.schema.id {
            SchemaId::Clinical => validate_clinical(data)?,
            SchemaId::Assessment => check_required(&rt.schema, data)?,
        }
        metrics::histogram!("stage_validate_us").record(now_us(t_val) as f64);

        // feature build（编码 + 缩放）
        let t_feat = Instant::now();
        let row = rt.build_row(data)?;
        metrics::histogram!("stage_feature_us").record(now_us(t_feat) as f64);

        // predict
        let t_pred = Instant::now();
        let p = rt.predict_proba(&row);
        metrics::histogram!("stage_predict_us").record(now_us(t_pred) as f64);

        let assessment = RiskAssessment {
            probability: p,
            class: rt.policy.class_of(p),
            level: rt.policy.tier_of(p),
            risk_factors: risk_factors(data),
        };

        metrics::histogram!("e2e_us").record(now_us(t0) as f64);
        Ok(assessment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_predict_without_model_is_not_ready() {
        let core = AppCore::new(Config::default(), None);
        let mut data = json!({"Age": 72, "Gender": "F", "MMSE": 18})
            .as_object()
            .unwrap()
            .clone();
        assert!(matches!(
            core.predict(&mut data),
            Err(PredictError::NotReady)
        ));
    }
}
