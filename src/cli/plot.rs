use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use indicatif::{ParallelProgressIterator, ProgressBar};
use log::{error, info, warn};
use rayon::prelude::*;

use crate::cli::SubCommandExtend;
use crate::config::{AestheticsConfig, Opts, RECORD_FILE_NAME, TsneOptions};
use crate::pipeline::{AestheticFailure, run_file};
use crate::scene::SceneFormat;
use crate::tsne::TsneParams;
use crate::utils::pb_style;

#[derive(Parser, Debug, Clone)]
pub struct PlotCommand {
    /// 图片目录，每个风格一个子目录，其中包含记录文件
    #[arg(long, value_name = "DIR", default_value = "images")]
    pub images_dir: PathBuf,
    /// 输出目录
    #[arg(short, long, value_name = "DIR", default_value = "dashboard")]
    pub output_dir: PathBuf,
    /// 输出格式
    #[arg(short, long, value_enum, default_value_t = SceneFormat::Html)]
    pub format: SceneFormat,
    /// 同时处理的风格数量，0 表示 CPU 核心数
    #[arg(short, long, default_value_t = 1)]
    pub jobs: usize,
    /// 只处理指定的风格
    #[arg(long, value_name = "NAME", num_args = 1..)]
    pub only: Vec<String>,
    #[command(flatten)]
    pub tsne: TsneOptions,
}

impl SubCommandExtend for PlotCommand {
    fn run(&self, opts: &Opts) -> Result<()> {
        let config = AestheticsConfig::load(opts.conf_dir.aesthetics())?;
        let selected = config.select(&self.only)?;
        let params = TsneParams::from(&self.tsne);

        // 缺少记录文件的风格直接跳过，不算失败
        let tasks: Vec<_> = selected
            .into_iter()
            .filter_map(|aesthetic| {
                let path = self.images_dir.join(&aesthetic.name).join(RECORD_FILE_NAME);
                if path.is_file() {
                    Some((aesthetic, path))
                } else {
                    warn!("跳过 {}：找不到记录文件 {}", aesthetic.name, path.display());
                    None
                }
            })
            .collect();
        info!("共 {} 个风格待处理", tasks.len());

        fs::create_dir_all(&self.output_dir)
            .with_context(|| format!("无法创建输出目录: {}", self.output_dir.display()))?;

        let jobs = if self.jobs == 0 { num_cpus::get() } else { self.jobs };
        let pool = rayon::ThreadPoolBuilder::new().num_threads(jobs).build()?;

        let pb = ProgressBar::new(tasks.len() as u64).with_style(pb_style()).with_message("降维中...");
        let results: Vec<Result<PathBuf, AestheticFailure>> = pool.install(|| {
            tasks
                .par_iter()
                .progress_with(pb)
                .map(|(aesthetic, path)| -> Result<PathBuf, AestheticFailure> {
                    let scene = run_file(aesthetic, &config.palette, &params, path)?;
                    let output = self
                        .output_dir
                        .join(format!("{}.{}", aesthetic.output_stem(), self.format.extension()));
                    scene.write(&output, self.format).map_err(|cause| AestheticFailure {
                        aesthetic: aesthetic.name.clone(),
                        records: scene.meta.records,
                        cause,
                    })?;
                    Ok(output)
                })
                .collect()
        });

        let mut failures = 0;
        for result in &results {
            match result {
                Ok(output) => info!("已生成 {}", output.display()),
                Err(failure) => {
                    error!("{failure}");
                    failures += 1;
                }
            }
        }

        if failures > 0 {
            bail!("{failures}/{} 个风格处理失败", results.len());
        }
        info!("全部完成");
        Ok(())
    }
}
