use serde::{Deserialize, Serialize};

/// 均值/方差标准化，只作用在选定的列子集上。
///
/// fit 只在训练时发生一次；推理侧拿同一份 (columns, mean, scale)
/// 原样再套一遍。列子集或顺序对不上不会报错，只会悄悄算错，
/// 所以 columns 持久化在 scaler 自己身上，不依赖调用方传参。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub columns: Vec<usize>,
    pub mean: Vec<f32>,
    pub scale: Vec<f32>,
}

impl StandardScaler {
    /// 在训练集的选定列上拟合。总体方差（除 n 不除 n-1）；
    /// 零方差列的 scale 记 1，变换后恒为 0。
    pub fn fit(rows: &[Vec<f32>], columns: &[usize]) -> Self {
        let n = rows.len().max(1) as f32;
        let mut mean = Vec::with_capacity(columns.len());
        let mut scale = Vec::with_capacity(columns.len());

        for &col in columns {
            let m = rows.iter().map(|r| r[col]).sum::<f32>() / n;
            let var = rows.iter().map(|r| (r[col] - m) * (r[col] - m)).sum::<f32>() / n;
            let s = var.sqrt();
            mean.push(m);
            scale.push(if s == 0.0 { 1.0 } else { s });
        }

        Self {
            columns: columns.to_vec(),
            mean,
            scale,
        }
    }

    pub fn transform_row(&self, row: &mut [f32]) {
        for (i, &col) in self.columns.iter().enumerate() {
            row[col] = (row[col] - self.mean[i]) / self.scale[i];
        }
    }

    pub fn transform(&self, rows: &mut [Vec<f32>]) {
        for row in rows {
            self.transform_row(row);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_transform_selected_columns_only() {
        let mut rows = vec![
            vec![1.0, 7.0, 10.0],
            vec![2.0, 7.0, 20.0],
            vec![3.0, 7.0, 30.0],
        ];
        let scaler = StandardScaler::fit(&rows, &[0, 2]);
        scaler.transform(&mut rows);

        // 列 0：mean=2, std=sqrt(2/3)
        assert!((rows[1][0] - 0.0).abs() < 1e-6);
        assert!(rows[0][0] < 0.0 && rows[2][0] > 0.0);
        // 列 1 没在子集里：原样
        assert_eq!(rows[0][1], 7.0);
        // 变换后均值 ~0
        let m: f32 = rows.iter().map(|r| r[2]).sum::<f32>() / 3.0;
        assert!(m.abs() < 1e-6);
    }

    #[test]
    fn test_zero_variance_column() {
        let mut rows = vec![vec![5.0], vec![5.0]];
        let scaler = StandardScaler::fit(&rows, &[0]);
        assert_eq!(scaler.scale[0], 1.0);
        scaler.transform(&mut rows);
        assert_eq!(rows[0][0], 0.0);
    }

    #[test]
    fn test_reapplication_matches_fit_time_transform() {
        let rows = vec![vec![10.0, 1.0], vec![30.0, 0.0]];
        let scaler = StandardScaler::fit(&rows, &[0]);

        let mut a = vec![20.0, 1.0];
        let mut b = vec![20.0, 1.0];
        scaler.transform_row(&mut a);
        scaler.clone().transform_row(&mut b);
        assert_eq!(a, b);
        assert_eq!(a[1], 1.0);
    }
}
