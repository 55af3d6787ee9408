use crate::features::{FeatureSchema, FieldKind};
use anyhow::{bail, Context, Result};
use std::path::Path;

/// 训练用的打标数据集：行与 schema.fields 同序同宽。
#[derive(Debug, Clone)]
pub struct Dataset {
    pub x: Vec<Vec<f32>>,
    pub y: Vec<u8>,
    pub n_features: usize,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.y.len()
    }

    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }
}

/// 读训练 CSV 并按 schema 编码。
///
/// - schema 列或 label 列缺失 → 数据错误，一次性列出所有缺列
/// - Numeric 列按 f32 解析，错误里带行号
/// - Indicator 列：单元格等于 positive token 记 1；数值编码的 CSV
///   （clinical 的 Gender 是 0/1，0=F）按 csv_positive 对照
/// - Flag 列：0/1 或 true/false，宽松解析
/// - label：非零记 1
pub fn load_csv(path: &Path, schema: &FeatureSchema, label_column: &str) -> Result<Dataset> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("read training csv: {}", path.display()))?;

    let headers = reader
        .headers()
        .with_context(|| format!("read csv headers: {}", path.display()))?
        .clone();

    let col_of = |name: &str| headers.iter().position(|h| h == name);

    let mut missing: Vec<&str> = schema
        .fields
        .iter()
        .map(|f| f.name.as_str())
        .filter(|name| col_of(name).is_none())
        .collect();
    if col_of(label_column).is_none() {
        missing.push(label_column);
    }
    if !missing.is_empty() {
        bail!("CSV missing required columns: {}", missing.join(", "));
    }

    let field_cols: Vec<usize> = schema
        .fields
        .iter()
        .map(|f| col_of(&f.name).expect("checked above"))
        .collect();
    let label_col = col_of(label_column).expect("checked above");

    let mut x = Vec::new();
    let mut y = Vec::new();

    for (row_idx, record) in reader.records().enumerate() {
        let line = row_idx + 2; // 头一行是 header
        let record = record.with_context(|| format!("read csv row {line}"))?;

        let mut row = Vec::with_capacity(schema.fields.len());
        for (field, &col) in schema.fields.iter().zip(&field_cols) {
            let cell = record.get(col).unwrap_or("").trim();
            let v = match &field.kind {
                FieldKind::Numeric => cell.parse::<f32>().with_context(|| {
                    format!("row {line}: column {} is not numeric: {cell:?}", field.name)
                })?,
                FieldKind::Indicator {
                    positive,
                    csv_positive,
                } => {
                    if cell == positive {
                        1.0
                    } else if let Ok(raw) = cell.parse::<f32>() {
                        if raw == *csv_positive {
                            1.0
                        } else {
                            0.0
                        }
                    } else {
                        0.0
                    }
                }
                FieldKind::Flag => {
                    if cell.eq_ignore_ascii_case("true") {
                        1.0
                    } else if let Ok(raw) = cell.parse::<f32>() {
                        if raw != 0.0 {
                            1.0
                        } else {
                            0.0
                        }
                    } else {
                        0.0
                    }
                }
            };
            row.push(v);
        }

        let label_cell = record.get(label_col).unwrap_or("").trim();
        let label = label_cell.parse::<f32>().with_context(|| {
            format!("row {line}: label column {label_column} is not numeric: {label_cell:?}")
        })?;

        x.push(row);
        y.push(u8::from(label != 0.0));
    }

    if x.is_empty() {
        bail!("CSV has no data rows: {}", path.display());
    }

    Ok(Dataset {
        n_features: schema.fields.len(),
        x,
        y,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::SchemaId;
    use std::io::Write;

    fn write_csv(content: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    const HEADER: &str = "Age,Gender,MMSE,FamilyHistoryAlzheimers,CardiovascularDisease,Diabetes,\
Depression,HeadInjury,Hypertension,MemoryComplaints,Confusion,Disorientation,PersonalityChanges,\
DifficultyCompletingTasks,Forgetfulness,Diagnosis";

    #[test]
    fn test_load_clinical_csv() {
        let csv = format!(
            "{HEADER}\n72,0,18,1,0,0,0,0,1,1,0,0,0,0,1,1\n55,1,29,0,0,0,0,0,0,0,0,0,0,0,0,0\n"
        );
        let f = write_csv(&csv);
        let ds = load_csv(f.path(), &FeatureSchema::by_id(SchemaId::Clinical), "Diagnosis").unwrap();

        assert_eq!(ds.len(), 2);
        assert_eq!(ds.n_features, 15);
        // Gender 列 0=F → 编码 1（与线上编码一致）
        assert_eq!(ds.x[0][1], 1.0);
        assert_eq!(ds.x[1][1], 0.0);
        assert_eq!(ds.x[0][0], 72.0);
        assert_eq!(ds.y, vec![1, 0]);
    }

    #[test]
    fn test_missing_columns_listed() {
        let f = write_csv("Age,Gender\n72,0\n");
        let err = load_csv(
            f.path(),
            &FeatureSchema::by_id(SchemaId::Clinical),
            "Diagnosis",
        )
        .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("MMSE") && msg.contains("Diagnosis"));
    }

    #[test]
    fn test_bad_numeric_cell_reports_row() {
        let csv = format!("{HEADER}\nabc,0,18,0,0,0,0,0,0,0,0,0,0,0,0,0\n");
        let f = write_csv(&csv);
        let err = load_csv(
            f.path(),
            &FeatureSchema::by_id(SchemaId::Clinical),
            "Diagnosis",
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("row 2"));
    }
}
