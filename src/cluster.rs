use std::collections::HashSet;

use log::debug;
use serde::Serialize;
use thiserror::Error;

use crate::display::DisplaySubset;

/// 默认的连线颜色，按聚类声明顺序循环使用
pub const DEFAULT_PALETTE: [&str; 8] = [
    "rgba(255,120,120,0.85)",
    "rgba(120,255,120,0.85)",
    "rgba(120,120,255,0.85)",
    "rgba(255,200,120,0.85)",
    "rgba(180,120,255,0.85)",
    "rgba(120,255,255,0.85)",
    "rgba(255,180,220,0.85)",
    "rgba(220,255,180,0.85)",
];

pub fn default_palette() -> Vec<String> {
    DEFAULT_PALETTE.iter().map(|s| s.to_string()).collect()
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClusterError {
    #[error("调色板不能为空")]
    EmptyPalette,
}

/// 同一聚类内两个点之间的连线
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ClusterEdge {
    pub source_label: String,
    pub target_label: String,
    /// 两端点在展示子集中的下标
    #[serde(skip)]
    pub source: usize,
    #[serde(skip)]
    pub target: usize,
    /// 聚类序号对调色板长度取模
    pub color_index: usize,
}

/// 为每个聚类生成完全图的边
///
/// 不在展示子集中的标签（不存在或者是离群点）会被忽略，组内重复的标签只算一次，
/// 剩余成员不足 2 个的聚类不产生任何边。
/// 不同聚类之间可能产生重复的边，也可能分到相同的颜色。
pub fn build_edges(
    groups: &[Vec<String>],
    subset: &DisplaySubset,
    palette_len: usize,
) -> Result<Vec<ClusterEdge>, ClusterError> {
    if palette_len == 0 {
        return Err(ClusterError::EmptyPalette);
    }

    let mut edges = vec![];
    for (g, group) in groups.iter().enumerate() {
        let color_index = g % palette_len;
        // 组内重复的标签只保留第一次出现
        let mut seen = HashSet::new();
        let indices: Vec<usize> =
            group.iter().filter_map(|l| subset.position(l)).filter(|&i| seen.insert(i)).collect();
        debug!("聚类 {g}：{}/{} 个标签可见", indices.len(), group.len());

        for (a, &i) in indices.iter().enumerate() {
            for &j in &indices[a + 1..] {
                edges.push(ClusterEdge {
                    source_label: subset.labels()[i].clone(),
                    target_label: subset.labels()[j].clone(),
                    source: i,
                    target: j,
                    color_index,
                });
            }
        }
    }
    Ok(edges)
}
