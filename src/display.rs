use std::collections::{HashMap, HashSet};

use crate::record::VectorRecord;
use crate::tsne::Embedding;

/// 去掉离群点之后用于展示的子集
///
/// 保持原有的相对顺序，并记录每个点在原始记录中的位置
#[derive(Debug, Clone, Default)]
pub struct DisplaySubset {
    labels: Vec<String>,
    coords: Vec<[f64; 3]>,
    instance_counts: Vec<u32>,
    original_index: Vec<usize>,
    /// 标签到展示子集下标的映射，标签重复时以最后一次出现为准
    index: HashMap<String, usize>,
}

impl DisplaySubset {
    /// 过滤掉 outliers 中的标签，不存在于记录中的离群标签直接忽略
    pub fn filter(records: &[VectorRecord], embedding: &Embedding, outliers: &HashSet<String>) -> Self {
        assert_eq!(records.len(), embedding.len(), "records and embedding length mismatch");

        let mut subset = Self::default();
        for (i, record) in records.iter().enumerate() {
            if outliers.contains(&record.label) {
                continue;
            }
            subset.index.insert(record.label.clone(), subset.labels.len());
            subset.labels.push(record.label.clone());
            subset.coords.push(embedding.point(i));
            subset.instance_counts.push(record.instance_count);
            subset.original_index.push(i);
        }
        subset
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// 标签在展示子集中的位置
    pub fn position(&self, label: &str) -> Option<usize> {
        self.index.get(label).copied()
    }

    pub fn contains(&self, label: &str) -> bool {
        self.index.contains_key(label)
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn coords(&self) -> &[[f64; 3]] {
        &self.coords
    }

    pub fn instance_counts(&self) -> &[u32] {
        &self.instance_counts
    }

    /// 展示子集中第 i 个点在原始记录中的下标
    pub fn original_index(&self, i: usize) -> usize {
        self.original_index[i]
    }
}

#[cfg(test)]
mod tests {
    use ndarray::Array2;

    use super::*;

    fn records(labels: &[&str]) -> Vec<VectorRecord> {
        labels
            .iter()
            .enumerate()
            .map(|(i, l)| VectorRecord {
                label: l.to_string(),
                relevance_score: 1.0,
                instance_count: i as u32,
                vector: vec![i as f64],
            })
            .collect()
    }

    fn embedding(n: usize) -> Embedding {
        let coords = Array2::from_shape_fn((n, 3), |(i, k)| (i * 10 + k) as f64);
        Embedding { coords, kl_divergence: 0.0, n_iter: 0 }
    }

    fn set(labels: &[&str]) -> HashSet<String> {
        labels.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_filter_preserves_order_and_mapping() {
        let recs = records(&["A", "B", "C", "D"]);
        let subset = DisplaySubset::filter(&recs, &embedding(4), &set(&["B"]));

        assert_eq!(subset.labels(), ["A", "C", "D"]);
        assert_eq!(subset.instance_counts(), [0, 2, 3]);
        assert_eq!(subset.coords()[1], [20.0, 21.0, 22.0]);
        assert_eq!(subset.original_index(1), 2);
        assert_eq!(subset.position("C"), Some(1));
        assert_eq!(subset.position("B"), None);
    }

    #[test]
    fn test_missing_outliers_are_ignored() {
        let recs = records(&["A", "B"]);
        let subset = DisplaySubset::filter(&recs, &embedding(2), &set(&["Nope", "Ocean"]));
        assert_eq!(subset.len(), 2);
    }

    #[test]
    fn test_outlier_correctness() {
        let recs = records(&["Sea", "Blue", "Fin", "Ocean", "Wind"]);
        let outliers = set(&["Blue", "Ocean"]);
        let subset = DisplaySubset::filter(&recs, &embedding(5), &outliers);
        for r in &recs {
            assert_eq!(subset.contains(&r.label), !outliers.contains(&r.label));
        }
    }

    #[test]
    fn test_duplicate_label_maps_to_last() {
        let recs = records(&["A", "B", "A"]);
        let subset = DisplaySubset::filter(&recs, &embedding(3), &HashSet::new());
        assert_eq!(subset.len(), 3);
        assert_eq!(subset.position("A"), Some(2));
    }

    #[test]
    #[should_panic(expected = "records and embedding length mismatch")]
    fn test_length_mismatch() {
        DisplaySubset::filter(&records(&["A"]), &embedding(2), &HashSet::new());
    }
}
