use std::collections::HashSet;

use crate::config::AestheticConfig;
use crate::record::VectorRecord;

/// 一个风格的全部数据：按文件顺序排列的记录，以及人工整理的聚类和离群标签
///
/// 聚类和离群标签可以引用不存在的标签，后续处理时直接忽略。
#[derive(Debug, Clone)]
pub struct AestheticDataset {
    pub name: String,
    pub records: Vec<VectorRecord>,
    pub cluster_groups: Vec<Vec<String>>,
    pub outlier_labels: HashSet<String>,
}

impl AestheticDataset {
    pub fn new(
        name: impl Into<String>,
        records: Vec<VectorRecord>,
        cluster_groups: Vec<Vec<String>>,
        outliers: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            name: name.into(),
            records,
            cluster_groups,
            outlier_labels: outliers.into_iter().collect(),
        }
    }

    pub fn from_config(config: &AestheticConfig, records: Vec<VectorRecord>) -> Self {
        Self::new(
            config.name.clone(),
            records,
            config.clusters.clone(),
            config.outliers.iter().cloned(),
        )
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn is_outlier(&self, label: &str) -> bool {
        self.outlier_labels.contains(label)
    }
}
