use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// 命名的特征 schema 版本。
///
/// 两个服务的特征表/编码并不兼容（clinical 把 "F" 编成 1，
/// assessment 把 "Male" 编成 1），所以 schema 必须显式命名、
/// 随模型一起持久化，加载时核对，而不是靠调用方约定。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaId {
    Clinical,
    Assessment,
}

impl fmt::Display for SchemaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaId::Clinical => write!(f, "clinical"),
            SchemaId::Assessment => write!(f, "assessment"),
        }
    }
}

impl FromStr for SchemaId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "clinical" => Ok(SchemaId::Clinical),
            "assessment" => Ok(SchemaId::Assessment),
            other => Err(anyhow!("unknown schema: {other} (expect clinical|assessment)")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum FieldKind {
    /// 数值列：原样进特征向量；缺失/非数值是 encode 错误
    Numeric,
    /// 类别指示列：字符串等于 positive 记 1，其余（含缺失）记 0。
    /// csv_positive 是训练 CSV 数值编码下应映射为 1 的原始值
    /// （clinical 的 Gender 列 0=F，所以是 0.0）
    Indicator { positive: String, csv_positive: f32 },
    /// 布尔临床标志：truthy 记 1，缺省按 false 处理，从不拒绝
    Flag,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    #[serde(flatten)]
    pub kind: FieldKind,
}

impl FieldDef {
    fn numeric(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: FieldKind::Numeric,
        }
    }

    fn indicator(name: &str, positive: &str, csv_positive: f32) -> Self {
        Self {
            name: name.to_string(),
            kind: FieldKind::Indicator {
                positive: positive.to_string(),
                csv_positive,
            },
        }
    }

    fn flag(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: FieldKind::Flag,
        }
    }
}

/// 定长、定序的特征表。顺序必须与训练时完全一致，
/// 错位不会报错、只会悄悄算错——所以 runtime 加载时会核对长度和 id。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSchema {
    pub id: SchemaId,
    pub fields: Vec<FieldDef>,
}

impl FeatureSchema {
    pub fn by_id(id: SchemaId) -> Self {
        match id {
            SchemaId::Clinical => Self::clinical(),
            SchemaId::Assessment => Self::assessment(),
        }
    }

    /// Service A：临床症状标志为主的 15 维 schema，Gender 编码 "F"→1
    pub fn clinical() -> Self {
        Self {
            id: SchemaId::Clinical,
            fields: vec![
                FieldDef::numeric("Age"),
                FieldDef::indicator("Gender", "F", 0.0),
                FieldDef::numeric("MMSE"),
                FieldDef::flag("FamilyHistoryAlzheimers"),
                FieldDef::flag("CardiovascularDisease"),
                FieldDef::flag("Diabetes"),
                FieldDef::flag("Depression"),
                FieldDef::flag("HeadInjury"),
                FieldDef::flag("Hypertension"),
                FieldDef::flag("MemoryComplaints"),
                FieldDef::flag("Confusion"),
                FieldDef::flag("Disorientation"),
                FieldDef::flag("PersonalityChanges"),
                FieldDef::flag("DifficultyCompletingTasks"),
                FieldDef::flag("Forgetfulness"),
            ],
        }
    }

    /// Service B：人口学/化验指标为主的 20 维 schema，Gender 编码 "Male"→1
    pub fn assessment() -> Self {
        Self {
            id: SchemaId::Assessment,
            fields: vec![
                FieldDef::numeric("Age"),
                FieldDef::indicator("Gender", "Male", 1.0),
                FieldDef::numeric("EducationLevel"),
                FieldDef::numeric("BMI"),
                FieldDef::indicator("Smoking", "Yes", 1.0),
                FieldDef::indicator("AlcoholConsumption", "Yes", 1.0),
                FieldDef::indicator("PhysicalActivity", "Active", 1.0),
                FieldDef::flag("FamilyHistoryAlzheimers"),
                FieldDef::flag("CardiovascularDisease"),
                FieldDef::flag("Diabetes"),
                FieldDef::flag("Depression"),
                FieldDef::flag("HeadInjury"),
                FieldDef::flag("Hypertension"),
                FieldDef::numeric("SystolicBP"),
                FieldDef::numeric("DiastolicBP"),
                FieldDef::numeric("CholesterolTotal"),
                FieldDef::numeric("MMSE"),
                FieldDef::numeric("FunctionalAssessment"),
                FieldDef::flag("MemoryComplaints"),
                FieldDef::flag("BehavioralProblems"),
            ],
        }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    /// 标准化只作用在数值列上，布尔/指示列原样通过
    pub fn scaled_columns(&self) -> Vec<usize> {
        self.fields
            .iter()
            .enumerate()
            .filter(|(_, f)| f.kind == FieldKind::Numeric)
            .map(|(i, _)| i)
            .collect()
    }

    /// 从 JSON object 构造模型输入 row（dense f32），按 fields 定序走一遍：
    ///
    /// - Numeric：必须是数值（bool 按 0/1），缺失/类型不对 → 错误
    /// - Indicator：字符串等于 positive → 1，其余（含缺失）→ 0
    /// - Flag：truthy → 1，缺省 false，从不报错
    pub fn encode_row(&self, obj: &Map<String, Value>) -> Result<Vec<f32>> {
        let mut row = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            let v = match &field.kind {
                FieldKind::Numeric => match obj.get(&field.name) {
                    Some(Value::Number(n)) => n
                        .as_f64()
                        .ok_or_else(|| anyhow!("feature {} is not a finite number", field.name))?
                        as f32,
                    Some(Value::Bool(b)) => {
                        if *b {
                            1.0
                        } else {
                            0.0
                        }
                    }
                    Some(other) => {
                        return Err(anyhow!(
                            "feature {} must be numeric, got {other}",
                            field.name
                        ))
                    }
                    None => return Err(anyhow!("missing numeric feature: {}", field.name)),
                },
                FieldKind::Indicator { positive, .. } => match obj.get(&field.name) {
                    Some(Value::String(s)) if s == positive => 1.0,
                    _ => 0.0,
                },
                FieldKind::Flag => {
                    if truthy(obj.get(&field.name)) {
                        1.0
                    } else {
                        0.0
                    }
                }
            };
            row.push(v);
        }
        Ok(row)
    }
}

/// Python 式 truthy：None/null/false/0/"" 为假，其余为真
fn truthy(v: Option<&Value>) -> bool {
    match v {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map(|x| x != 0.0).unwrap_or(false),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
    }
}

/// 输入里严格为 true 的布尔字段名（Gender 除外），用于响应里的 risk_factors。
/// 注意：只认 JSON 布尔 true，数字 1 不算——与 encode 的宽松 truthy 不同。
pub fn risk_factors(obj: &Map<String, Value>) -> Vec<String> {
    obj.iter()
        .filter(|(name, v)| matches!(v, Value::Bool(true)) && name.as_str() != "Gender")
        .map(|(name, _)| name.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(v: Value) -> Map<String, Value> {
        v.as_object().unwrap().clone()
    }

    #[test]
    fn test_clinical_row_order_and_defaults() {
        let schema = FeatureSchema::clinical();
        let data = obj(json!({"Age": 72, "Gender": "F", "MMSE": 18, "MemoryComplaints": true}));
        let row = schema.encode_row(&data).unwrap();
        assert_eq!(row.len(), 15);
        assert_eq!(row[0], 72.0);
        assert_eq!(row[1], 1.0); // F → 1
        assert_eq!(row[2], 18.0);
        assert_eq!(row[9], 1.0); // MemoryComplaints
        // 其余 flag 缺省为 0
        assert_eq!(row[3], 0.0);
        assert_eq!(row[14], 0.0);
    }

    #[test]
    fn test_gender_encodings_diverge_between_schemas() {
        let clinical = FeatureSchema::clinical();
        let assessment = FeatureSchema::assessment();

        let male = obj(json!({
            "Age": 70, "Gender": "Male", "MMSE": 20, "EducationLevel": 2, "BMI": 23.5,
            "Smoking": "No", "AlcoholConsumption": "No", "PhysicalActivity": "Active",
            "SystolicBP": 120, "DiastolicBP": 80, "CholesterolTotal": 190,
            "FunctionalAssessment": 6
        }));
        // clinical：只有 "F" 是 1，"Male" 是 0
        assert_eq!(clinical.encode_row(&male).unwrap()[1], 0.0);
        // assessment："Male" 是 1
        let row = assessment.encode_row(&male).unwrap();
        assert_eq!(row.len(), 20);
        assert_eq!(row[1], 1.0);
        assert_eq!(row[4], 0.0); // Smoking "No"
        assert_eq!(row[6], 1.0); // PhysicalActivity "Active"
    }

    #[test]
    fn test_flag_truthy_coercion_is_permissive() {
        let schema = FeatureSchema::clinical();
        let data = obj(json!({
            "Age": 60, "Gender": "M", "MMSE": 25,
            "Diabetes": 1, "Depression": "yes", "Hypertension": 0, "Confusion": ""
        }));
        let row = schema.encode_row(&data).unwrap();
        assert_eq!(row[5], 1.0); // 数字 1
        assert_eq!(row[6], 1.0); // 非空字符串
        assert_eq!(row[8], 0.0); // 数字 0
        assert_eq!(row[10], 0.0); // 空字符串
    }

    #[test]
    fn test_missing_numeric_is_an_error() {
        let schema = FeatureSchema::clinical();
        let data = obj(json!({"Age": 60, "Gender": "M"}));
        let err = schema.encode_row(&data).unwrap_err();
        assert!(err.to_string().contains("MMSE"));
    }

    #[test]
    fn test_risk_factors_strict_true_and_no_gender() {
        let data = obj(json!({
            "Age": 72, "Gender": "F", "MMSE": 18,
            "MemoryComplaints": true, "Diabetes": false, "Confusion": 1
        }));
        assert_eq!(risk_factors(&data), vec!["MemoryComplaints".to_string()]);
    }

    #[test]
    fn test_scaled_columns_are_numeric_only() {
        assert_eq!(FeatureSchema::clinical().scaled_columns(), vec![0, 2]);
        let cols = FeatureSchema::assessment().scaled_columns();
        assert!(cols.contains(&0) && cols.contains(&3) && !cols.contains(&1));
    }

    #[test]
    fn test_schema_json_round_trip() {
        let schema = FeatureSchema::assessment();
        let s = serde_json::to_string(&schema).unwrap();
        let back: FeatureSchema = serde_json::from_str(&s).unwrap();
        assert_eq!(schema, back);
    }
}
