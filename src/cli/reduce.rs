use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use log::info;
use ndarray_npy::write_npy;

use crate::cli::SubCommandExtend;
use crate::config::{Opts, TsneOptions};
use crate::record::parse_file;
use crate::tsne::{Tsne, TsneParams};

#[derive(Parser, Debug, Clone)]
pub struct ReduceCommand {
    /// 记录文件路径
    pub file: PathBuf,
    /// 坐标输出路径，N×3 的 npy 矩阵，行顺序与记录文件一致
    #[arg(short, long, default_value = "embedding.npy")]
    pub output: PathBuf,
    #[command(flatten)]
    pub tsne: TsneOptions,
}

impl SubCommandExtend for ReduceCommand {
    fn run(&self, _opts: &Opts) -> Result<()> {
        let parsed = parse_file(&self.file)?;
        info!("读取 {} 条记录，跳过 {} 行", parsed.len(), parsed.skipped.len());

        let embedding = Tsne::new(TsneParams::from(&self.tsne)).fit_records(&parsed.records)?;
        write_npy(&self.output, &embedding.coords)?;
        info!(
            "导出成功：{}（{} 轮，KL 散度 {:.4}）",
            self.output.display(),
            embedding.n_iter,
            embedding.kl_divergence
        );
        Ok(())
    }
}
