use std::fmt;

/// 单类别的 precision / recall / F1 / support。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassMetrics {
    pub precision: f32,
    pub recall: f32,
    pub f1: f32,
    pub support: usize,
}

/// 留出集上的二分类评估结果：逐类指标 + 混淆矩阵。
/// confusion[真实][预测]，行 0/1 对应类别 0/1。
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationReport {
    pub classes: [ClassMetrics; 2],
    pub accuracy: f32,
    pub confusion: [[usize; 2]; 2],
}

pub fn classification_report(y_pred: &[u8], y_true: &[u8]) -> ClassificationReport {
    assert_eq!(y_pred.len(), y_true.len(), "pred/true length mismatch");
    assert!(!y_true.is_empty(), "empty evaluation set");

    let mut confusion = [[0usize; 2]; 2];
    for (&p, &t) in y_pred.iter().zip(y_true) {
        confusion[usize::from(t != 0)][usize::from(p != 0)] += 1;
    }

    let metrics_for = |class: usize| {
        let tp = confusion[class][class];
        let fp = confusion[1 - class][class];
        let fn_ = confusion[class][1 - class];
        let support = confusion[class][0] + confusion[class][1];

        let precision = ratio(tp, tp + fp);
        let recall = ratio(tp, tp + fn_);
        let f1 = if precision + recall == 0.0 {
            0.0
        } else {
            2.0 * precision * recall / (precision + recall)
        };
        ClassMetrics {
            precision,
            recall,
            f1,
            support,
        }
    };

    let correct = confusion[0][0] + confusion[1][1];
    ClassificationReport {
        classes: [metrics_for(0), metrics_for(1)],
        accuracy: correct as f32 / y_true.len() as f32,
        confusion,
    }
}

fn ratio(num: usize, den: usize) -> f32 {
    if den == 0 {
        0.0
    } else {
        num as f32 / den as f32
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:>10} {:>10} {:>10} {:>10} {:>10}", "", "precision", "recall", "f1-score", "support")?;
        for (class, m) in self.classes.iter().enumerate() {
            writeln!(
                f,
                "{:>10} {:>10.2} {:>10.2} {:>10.2} {:>10}",
                class, m.precision, m.recall, m.f1, m.support
            )?;
        }
        let total: usize = self.classes.iter().map(|m| m.support).sum();
        writeln!(f, "{:>10} {:>32.2} {:>10}", "accuracy", self.accuracy, total)?;
        writeln!(f)?;
        writeln!(f, "Confusion Matrix:")?;
        writeln!(f, "[[{} {}]", self.confusion[0][0], self.confusion[0][1])?;
        write!(f, " [{} {}]]", self.confusion[1][0], self.confusion[1][1])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_confusion_matrix() {
        let y_true = [1, 1, 1, 0, 0, 0, 0, 1];
        let y_pred = [1, 0, 1, 0, 0, 1, 0, 1];
        let r = classification_report(&y_pred, &y_true);

        assert_eq!(r.confusion, [[3, 1], [1, 3]]);
        assert_eq!(r.classes[1].support, 4);
        assert!((r.classes[1].precision - 0.75).abs() < 1e-6);
        assert!((r.classes[1].recall - 0.75).abs() < 1e-6);
        assert!((r.accuracy - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_degenerate_predictions() {
        // 全预测成 0：类 1 的 precision/recall 都是 0，不除零
        let y_true = [0, 0, 1, 1];
        let y_pred = [0, 0, 0, 0];
        let r = classification_report(&y_pred, &y_true);
        assert_eq!(r.classes[1].precision, 0.0);
        assert_eq!(r.classes[1].recall, 0.0);
        assert_eq!(r.classes[1].f1, 0.0);
        assert!((r.accuracy - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_display_contains_confusion_matrix() {
        let r = classification_report(&[1, 0], &[1, 0]);
        let s = r.to_string();
        assert!(s.contains("precision"));
        assert!(s.contains("Confusion Matrix:"));
    }
}
