use std::convert::Infallible;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::LazyLock;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::cli::*;
use crate::cluster::default_palette;
use crate::tsne::{Init, TsneParams};

/// 每个风格目录下的记录文件名
pub const RECORD_FILE_NAME: &str = "vectors_object_instances.txt";

static CONF_DIR: LazyLock<ConfDir> = LazyLock::new(|| {
    let proj_dirs = ProjectDirs::from("", "", "embedscape").expect("failed to get project dir");
    ConfDir { path: proj_dirs.config_dir().to_path_buf() }
});

fn default_config_dir() -> &'static str {
    CONF_DIR.path().to_str().expect("config dir is not valid utf-8")
}

#[derive(Parser, Debug, Clone)]
pub struct TsneOptions {
    /// 邻域大小，样本数量必须不小于 perplexity + 1
    #[arg(long, value_name = "N", default_value_t = 10.0)]
    pub perplexity: f64,
    /// 梯度下降学习率
    #[arg(long, value_name = "RATE", default_value_t = 200.0)]
    pub learning_rate: f64,
    /// 最大迭代次数，不能小于 250
    #[arg(long, value_name = "N", default_value_t = 1000)]
    pub max_iter: usize,
    /// 前 250 轮的概率放大倍数
    #[arg(long, value_name = "FACTOR", default_value_t = 12.0)]
    pub early_exaggeration: f64,
    /// 随机数种子
    #[arg(long, default_value_t = 242)]
    pub seed: u64,
    /// 初始化方式
    #[arg(long, value_enum, default_value_t = Init::Pca)]
    pub init: Init,
    /// 输出 t-SNE 迭代过程
    #[arg(long)]
    pub verbose_tsne: bool,
}

impl From<&TsneOptions> for TsneParams {
    fn from(opts: &TsneOptions) -> Self {
        Self {
            n_components: 3,
            perplexity: opts.perplexity,
            learning_rate: opts.learning_rate,
            max_iter: opts.max_iter,
            early_exaggeration: opts.early_exaggeration,
            seed: opts.seed,
            init: opts.init,
            verbose: opts.verbose_tsne,
        }
    }
}

#[derive(Parser, Debug, Clone)]
#[command(name = "embedscape", version)]
pub struct Opts {
    #[command(subcommand)]
    pub subcmd: SubCommand,
    /// 配置文件目录，其中的 aesthetics.json 定义了各风格的聚类和离群标签
    #[arg(short, long, default_value = default_config_dir())]
    pub conf_dir: ConfDir,
}

#[derive(Subcommand, Debug, Clone)]
pub enum SubCommand {
    /// 为配置中的所有风格生成三维嵌入图
    Plot(PlotCommand),
    /// 对单个记录文件降维，并导出坐标
    Reduce(ReduceCommand),
    /// 检查记录文件的格式
    Check(CheckCommand),
}

#[derive(Debug, Clone)]
pub struct ConfDir {
    path: PathBuf,
}

impl ConfDir {
    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// 返回风格配置文件的路径
    pub fn aesthetics(&self) -> PathBuf {
        self.path.join("aesthetics.json")
    }
}

impl FromStr for ConfDir {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self { path: PathBuf::from(s) })
    }
}

/// 单个风格的配置
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct AestheticConfig {
    pub name: String,
    /// 输出文件名，扩展名会按输出格式替换
    #[serde(default)]
    pub output: Option<String>,
    /// 人工整理的聚类，每组为若干标签
    #[serde(default)]
    pub clusters: Vec<Vec<String>>,
    /// 不展示但参与降维的标签
    #[serde(default)]
    pub outliers: Vec<String>,
}

impl AestheticConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), output: None, clusters: vec![], outliers: vec![] }
    }

    /// 输出文件名（不含扩展名）
    pub fn output_stem(&self) -> String {
        match &self.output {
            Some(output) => Path::new(output)
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| output.clone()),
            None => format!("{}_embedding", self.name),
        }
    }
}

/// aesthetics.json 的内容
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct AestheticsConfig {
    /// 聚类连线使用的颜色
    #[serde(default = "default_palette")]
    pub palette: Vec<String>,
    pub aesthetics: Vec<AestheticConfig>,
}

impl Default for AestheticsConfig {
    fn default() -> Self {
        Self { palette: default_palette(), aesthetics: vec![] }
    }
}

impl AestheticsConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("无法读取配置文件: {}", path.display()))?;
        let config = Self::from_str(&text)
            .with_context(|| format!("配置文件格式错误: {}", path.display()))?;
        Ok(config)
    }

    pub fn get(&self, name: &str) -> Option<&AestheticConfig> {
        self.aesthetics.iter().find(|a| a.name == name)
    }

    /// 按名称挑选风格，保持命令行给出的顺序；名称为空时返回全部
    pub fn select(&self, names: &[String]) -> Result<Vec<&AestheticConfig>> {
        if names.is_empty() {
            return Ok(self.aesthetics.iter().collect());
        }
        names
            .iter()
            .map(|name| self.get(name).ok_or_else(|| anyhow!("配置中没有风格: {}", name)))
            .collect()
    }
}

impl FromStr for AestheticsConfig {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let config: Self = serde_json::from_str(s)?;
        if config.palette.is_empty() {
            return Err(anyhow!("palette 不能为空"));
        }
        Ok(config)
    }
}
