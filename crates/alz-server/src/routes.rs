use alz_core::features::SchemaId;
use alz_core::pipeline::AppCore;
use alz_core::schema::{ErrorBody, PredictError, PredictResponse, ScoreResponse, StatusResponse};
use axum::{
    extract::State,
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

#[derive(Clone)]
pub struct AppState {
    pub core: Arc<AppCore>,
    pub prom: PrometheusHandle,
}

/// 按 schema 组路由：同一套处理代码，两份数据契约。
/// clinical = Service A（状态页 + 分级预测），
/// assessment = Service B（仅概率 + 预检 + 受限 CORS）。
pub fn router(schema: SchemaId, cors_origin: &str, state: AppState) -> anyhow::Result<Router> {
    let app = match schema {
        SchemaId::Clinical => Router::new()
            .route("/", get(home))
            .route("/predict", post(predict_clinical))
            .route("/metrics", get(metrics))
            .layer(CorsLayer::permissive()),
        SchemaId::Assessment => {
            let cors = CorsLayer::new()
                .allow_origin(cors_origin.parse::<HeaderValue>()?)
                .allow_methods([Method::POST, Method::OPTIONS])
                .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
                .allow_credentials(true)
                .max_age(Duration::from_secs(3600));
            Router::new()
                .route("/predict", post(predict_assessment).options(preflight))
                .route("/metrics", get(metrics))
                .layer(cors)
        }
    };
    Ok(app.layer(TraceLayer::new_for_http()).with_state(state))
}

async fn home(State(st): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "success".to_string(),
        message: "Alzheimer's Disease Detection API".to_string(),
        model_status: if st.core.model_loaded() {
            "loaded".to_string()
        } else {
            "not loaded".to_string()
        },
        available_endpoints: json!({
            "/": "Get API status (GET)",
            "/predict": "Make predictions (POST)"
        }),
        version: st.core.cfg.version.clone(),
    })
}

async fn predict_clinical(
    State(st): State<AppState>,
    body: Option<Json<Map<String, Value>>>,
) -> Response {
    let Some(Json(mut data)) = body else {
        return error_response(StatusCode::BAD_REQUEST, "No data provided");
    };

    let trace_id = Uuid::new_v4();
    match st.core.predict(&mut data) {
        Ok(a) => (StatusCode::OK, Json(PredictResponse::from_assessment(&a))).into_response(),
        Err(e) => {
            tracing::warn!(%trace_id, err = %e, "clinical predict failed");
            error_response(clinical_status(&e), e.to_string())
        }
    }
}

async fn predict_assessment(
    State(st): State<AppState>,
    body: Option<Json<Map<String, Value>>>,
) -> Response {
    let Some(Json(mut data)) = body else {
        return error_response(StatusCode::BAD_REQUEST, "No data provided");
    };

    let trace_id = Uuid::new_v4();
    match st.core.predict(&mut data) {
        Ok(a) => (
            StatusCode::OK,
            Json(ScoreResponse {
                prediction: a.probability as f64,
                status: "success".to_string(),
            }),
        )
            .into_response(),
        Err(e) => {
            tracing::warn!(%trace_id, err = %e, "assessment predict failed");
            error_response(assessment_status(&e), e.to_string())
        }
    }
}

async fn preflight() -> Response {
    (StatusCode::OK, Json(json!({"status": "ok"}))).into_response()
}

async fn metrics(State(st): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, st.prom.render())
}

/// clinical 的错误→状态码映射。校验错误走 500 而不是 400：
/// 这是对上游契约的保留（校验在缺字段分支之前抛出），
/// 客户端可能已经依赖，不要“顺手修掉”。
fn clinical_status(e: &PredictError) -> StatusCode {
    match e {
        PredictError::MissingBody => StatusCode::BAD_REQUEST,
        PredictError::NotReady => StatusCode::SERVICE_UNAVAILABLE,
        PredictError::Validation(_)
        | PredictError::MissingFields(_)
        | PredictError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// assessment 的映射：缺字段是显式 400，错误里列出字段名
fn assessment_status(e: &PredictError) -> StatusCode {
    match e {
        PredictError::MissingBody | PredictError::MissingFields(_) => StatusCode::BAD_REQUEST,
        PredictError::NotReady => StatusCode::SERVICE_UNAVAILABLE,
        PredictError::Validation(_) | PredictError::Internal(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn error_response(code: StatusCode, msg: impl Into<String>) -> Response {
    (code, Json(ErrorBody::new(msg))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn test_clinical_validation_maps_to_500() {
        let e = PredictError::Validation("MMSE must be between 0 and 30".to_string());
        assert_eq!(clinical_status(&e), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_assessment_missing_fields_maps_to_400() {
        let e = PredictError::MissingFields(vec!["MMSE".to_string()]);
        assert_eq!(assessment_status(&e), StatusCode::BAD_REQUEST);
        assert_eq!(clinical_status(&e), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_not_ready_maps_to_503_on_both() {
        assert_eq!(
            clinical_status(&PredictError::NotReady),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            assessment_status(&PredictError::NotReady),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_internal_maps_to_500() {
        let e = PredictError::Internal(anyhow!("missing numeric feature: BMI"));
        assert_eq!(assessment_status(&e), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
