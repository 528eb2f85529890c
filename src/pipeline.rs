use std::fmt;
use std::path::Path;

use anyhow::{Context, anyhow};
use log::{debug, info};

use crate::cluster::build_edges;
use crate::config::AestheticConfig;
use crate::dataset::AestheticDataset;
use crate::display::DisplaySubset;
use crate::record::{ParsedRecords, parse_str};
use crate::scene::{Scene, SceneMeta};
use crate::tsne::{Tsne, TsneParams};
use crate::utils::read_with_digest;

/// 单个风格处理失败的原因，不影响其他风格
#[derive(Debug)]
pub struct AestheticFailure {
    pub aesthetic: String,
    /// 尝试降维的记录数量
    pub records: usize,
    pub cause: anyhow::Error,
}

impl fmt::Display for AestheticFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}（{} 条记录）：{:#}", self.aesthetic, self.records, self.cause)
    }
}

impl std::error::Error for AestheticFailure {}

/// 从已解析的记录生成一个风格的场景
pub fn run_aesthetic(
    config: &AestheticConfig,
    palette: &[String],
    params: &TsneParams,
    parsed: ParsedRecords,
    input_digest: Option<String>,
) -> Result<Scene, AestheticFailure> {
    let skipped_lines = parsed.skipped.len();
    let dataset = AestheticDataset::from_config(config, parsed.records);
    let records = dataset.len();
    let fail = |cause: anyhow::Error| AestheticFailure { aesthetic: config.name.clone(), records, cause };

    debug!("{}：{} 条记录，跳过 {} 行", dataset.name, records, skipped_lines);

    let embedding = Tsne::new(params.clone()).fit_records(&dataset.records).map_err(|e| fail(e.into()))?;
    let subset = DisplaySubset::filter(&dataset.records, &embedding, &dataset.outlier_labels);
    let edges = build_edges(&dataset.cluster_groups, &subset, palette.len()).map_err(|e| fail(e.into()))?;

    info!(
        "{}：展示 {}/{} 个点，{} 条连线，KL 散度 {:.4}",
        dataset.name,
        subset.len(),
        records,
        edges.len(),
        embedding.kl_divergence
    );

    let meta = SceneMeta {
        records,
        displayed: subset.len(),
        skipped_lines,
        input_digest,
        kl_divergence: embedding.kl_divergence,
        n_iter: embedding.n_iter,
        tsne: params.clone(),
    };
    Ok(Scene::assemble(&dataset.name, &subset, &edges, palette, meta))
}

/// 读取记录文件并处理一个风格
pub fn run_file(
    config: &AestheticConfig,
    palette: &[String],
    params: &TsneParams,
    path: impl AsRef<Path>,
) -> Result<Scene, AestheticFailure> {
    let path = path.as_ref();
    let fail = |cause: anyhow::Error| AestheticFailure { aesthetic: config.name.clone(), records: 0, cause };

    let (bytes, digest) =
        read_with_digest(path).with_context(|| format!("无法读取记录文件: {}", path.display())).map_err(fail)?;
    let text = String::from_utf8(bytes)
        .map_err(|_| anyhow!("记录文件不是合法的 UTF-8: {}", path.display()))
        .map_err(fail)?;

    run_aesthetic(config, palette, params, parse_str(&text), Some(digest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::default_palette;
    use crate::record::parse_lines;
    use crate::tsne::ReduceError;

    fn line(label: &str, center: f64, j: usize) -> String {
        let v: Vec<String> = (0..4).map(|k| format!("{}", center + 0.01 * ((j * 7 + k * 3) % 5) as f64)).collect();
        format!("{label}:0.9:{}:[{}]", j % 4, v.join(", "))
    }

    fn lines(n: usize) -> Vec<String> {
        (0..n).map(|j| line(&format!("L{j}"), if j % 2 == 0 { 0.0 } else { 5.0 }, j)).collect()
    }

    #[test]
    fn test_outlier_and_cluster_scene() {
        let mut config = AestheticConfig::new("FA_test");
        config.clusters = vec![vec!["L0".into(), "L1".into(), "L2".into()]];
        config.outliers = vec!["L1".into()];
        let params = TsneParams { perplexity: 3.0, max_iter: 300, ..Default::default() };

        let scene = run_aesthetic(&config, &default_palette(), &params, parse_lines(lines(12)), None).unwrap();
        assert_eq!(scene.meta.records, 12);
        assert_eq!(scene.points.len(), 11);
        assert!(scene.points.iter().all(|p| p.label != "L1"));
        assert_eq!(scene.edges.len(), 1);
        assert_eq!((scene.edges[0].source.as_str(), scene.edges[0].target.as_str()), ("L0", "L2"));
    }

    #[test]
    fn test_too_few_records_fails() {
        let config = AestheticConfig::new("FA_small");
        let err = run_aesthetic(&config, &default_palette(), &TsneParams::default(), parse_lines(lines(5)), None)
            .unwrap_err();
        assert_eq!(err.aesthetic, "FA_small");
        assert_eq!(err.records, 5);
        assert_eq!(
            err.cause.downcast_ref::<ReduceError>(),
            Some(&ReduceError::PerplexityTooLarge { perplexity: 10.0, n_samples: 5 })
        );
    }

    #[test]
    fn test_run_file_digest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.txt");
        let mut text = lines(12).join("\n");
        text.push_str("\nbroken line\n");
        std::fs::write(&path, &text).unwrap();

        let params = TsneParams { perplexity: 3.0, max_iter: 300, ..Default::default() };
        let scene = run_file(&AestheticConfig::new("FA_file"), &default_palette(), &params, &path).unwrap();
        assert_eq!(scene.meta.skipped_lines, 1);
        assert_eq!(scene.meta.input_digest, Some(blake3::hash(text.as_bytes()).to_hex().to_string()));
    }

    #[test]
    fn test_run_file_missing() {
        let err = run_file(&AestheticConfig::new("FA_none"), &default_palette(), &TsneParams::default(), "nope.txt")
            .unwrap_err();
        assert_eq!(err.records, 0);
    }
}
