use crate::features::FeatureSchema;
use crate::schema::PredictError;
use serde_json::{Map, Value};

/// clinical schema 的入参校验。
///
/// 只管三个必填字段和它们的取值范围；可选的布尔标志一律宽松处理，
/// 交给 encode 的 truthy 兜底。副作用：把 Gender 原地归一成单字母
/// 大写（"male" → "M"），重复校验是幂等的。
pub fn validate_clinical(data: &mut Map<String, Value>) -> Result<(), PredictError> {
    for field in ["Age", "Gender", "MMSE"] {
        if !data.contains_key(field) {
            return Err(PredictError::Validation(format!(
                "Missing required field: {field}"
            )));
        }
    }

    let age = number_of(&data["Age"]);
    if !matches!(age, Some(v) if (0.0..=120.0).contains(&v)) {
        return Err(PredictError::Validation(
            "Age must be between 0 and 120".to_string(),
        ));
    }

    // str() 语义：非字符串也先转成文本再比对
    let gender = match &data["Gender"] {
        Value::String(s) => s.to_uppercase(),
        other => other.to_string().to_uppercase(),
    };
    if !matches!(gender.as_str(), "M" | "F" | "MALE" | "FEMALE") {
        return Err(PredictError::Validation(
            "Gender must be 'M' or 'F' (or 'Male'/'Female')".to_string(),
        ));
    }
    let canonical = gender.chars().next().map(String::from).unwrap_or_default();
    data.insert("Gender".to_string(), Value::String(canonical));

    let mmse = number_of(&data["MMSE"]);
    if !matches!(mmse, Some(v) if (0.0..=30.0).contains(&v)) {
        return Err(PredictError::Validation(
            "MMSE must be between 0 and 30".to_string(),
        ));
    }

    Ok(())
}

/// assessment schema：所有字段必填，缺哪个在错误里列出哪个
pub fn check_required(schema: &FeatureSchema, data: &Map<String, Value>) -> Result<(), PredictError> {
    let missing: Vec<String> = schema
        .fields
        .iter()
        .filter(|f| !data.contains_key(&f.name))
        .map(|f| f.name.clone())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(PredictError::MissingFields(missing))
    }
}

fn number_of(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}
