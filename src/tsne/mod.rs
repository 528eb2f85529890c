//! 精确（非 Barnes-Hut）t-SNE 降维
//!
//! 所有计算都是单线程、顺序固定的，相同输入和参数得到逐位相同的结果。

mod affinity;
mod optimize;
mod pca;

use clap::ValueEnum;
use log::info;
use ndarray::prelude::*;
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::StandardNormal;
use serde::Serialize;
use thiserror::Error;

use crate::record::VectorRecord;
use optimize::{DescentOptions, gradient_descent};

pub(crate) const MACHINE_EPSILON: f64 = f64::EPSILON;

/// 早期放大阶段的迭代次数
pub const EXPLORATION_ITER: usize = 250;
/// 每隔多少轮检查一次收敛
pub const N_ITER_CHECK: usize = 50;
/// 早期放大阶段之后，连续多少轮没有改善则停止
pub const N_ITER_WITHOUT_PROGRESS: usize = 300;
const EXPLORATION_MOMENTUM: f64 = 0.5;
const FINAL_MOMENTUM: f64 = 0.8;
const MIN_GAIN: f64 = 0.01;
const MIN_GRAD_NORM: f64 = 1e-7;
/// 随机初始化时的标准差
const RANDOM_INIT_STD: f64 = 1e-4;

/// 初始化方式
#[derive(ValueEnum, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Init {
    /// 投影到方差最大的方向上，不使用随机数
    Pca,
    /// 使用固定种子生成的高斯噪声
    Random,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct TsneParams {
    pub n_components: usize,
    pub perplexity: f64,
    pub learning_rate: f64,
    pub max_iter: usize,
    pub early_exaggeration: f64,
    pub seed: u64,
    pub init: Init,
    /// 是否输出迭代过程
    #[serde(skip)]
    pub verbose: bool,
}

impl Default for TsneParams {
    fn default() -> Self {
        Self {
            n_components: 3,
            perplexity: 10.0,
            learning_rate: 200.0,
            max_iter: 1000,
            early_exaggeration: 12.0,
            seed: 242,
            init: Init::Pca,
            verbose: false,
        }
    }
}

/// 降维失败的原因，均属于配置错误，只影响当前风格
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReduceError {
    #[error("没有可以降维的向量")]
    Empty,
    #[error("第 {index} 个向量的维度为 {found}，与第一个向量的维度 {expected} 不一致")]
    DimensionMismatch { index: usize, expected: usize, found: usize },
    #[error("perplexity ({perplexity}) 过大：至少需要 perplexity + 1 个向量，实际只有 {n_samples} 个")]
    PerplexityTooLarge { perplexity: f64, n_samples: usize },
    #[error("参数 {name} 无效: {value}")]
    InvalidParameter { name: &'static str, value: f64 },
    #[error("max_iter ({0}) 不能小于早期放大阶段的迭代次数 250")]
    TooFewIterations(usize),
}

/// 降维结果，第 i 行对应输入的第 i 个向量
#[derive(Debug, Clone)]
pub struct Embedding {
    pub coords: Array2<f64>,
    /// 最终的 KL 散度
    pub kl_divergence: f64,
    /// 实际执行的迭代轮数
    pub n_iter: usize,
}

impl Embedding {
    pub fn len(&self) -> usize {
        self.coords.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.coords.nrows() == 0
    }

    pub fn point(&self, i: usize) -> [f64; 3] {
        let row = self.coords.row(i);
        let get = |k: usize| row.get(k).copied().unwrap_or(0.0);
        [get(0), get(1), get(2)]
    }
}

pub struct Tsne {
    params: TsneParams,
}

impl Tsne {
    pub fn new(params: TsneParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &TsneParams {
        &self.params
    }

    fn validate(&self, n_samples: usize) -> Result<(), ReduceError> {
        let p = &self.params;
        let positive = [
            ("perplexity", p.perplexity),
            ("learning_rate", p.learning_rate),
            ("early_exaggeration", p.early_exaggeration),
        ];
        for (name, value) in positive {
            if !(value > 0.0 && value.is_finite()) {
                return Err(ReduceError::InvalidParameter { name, value });
            }
        }
        if p.n_components == 0 {
            return Err(ReduceError::InvalidParameter { name: "n_components", value: 0.0 });
        }
        if p.max_iter < EXPLORATION_ITER {
            return Err(ReduceError::TooFewIterations(p.max_iter));
        }
        if n_samples == 0 {
            return Err(ReduceError::Empty);
        }
        if (n_samples as f64) < p.perplexity + 1.0 {
            return Err(ReduceError::PerplexityTooLarge { perplexity: p.perplexity, n_samples });
        }
        Ok(())
    }

    /// 将记录中的向量堆叠成 N×D 矩阵，所有向量维度必须一致
    pub fn stack(records: &[VectorRecord]) -> Result<Array2<f64>, ReduceError> {
        let Some(first) = records.first() else {
            return Err(ReduceError::Empty);
        };
        let d = first.dim();
        let mut x = Array2::zeros((records.len(), d));
        for (i, record) in records.iter().enumerate() {
            if record.dim() != d {
                return Err(ReduceError::DimensionMismatch { index: i, expected: d, found: record.dim() });
            }
            x.row_mut(i).assign(&ArrayView1::from(record.vector.as_slice()));
        }
        Ok(x)
    }

    pub fn fit_records(&self, records: &[VectorRecord]) -> Result<Embedding, ReduceError> {
        self.validate(records.len())?;
        let x = Self::stack(records)?;
        self.fit_transform(x.view())
    }

    /// 对 N×D 的输入矩阵降维，返回 N×n_components 的坐标
    pub fn fit_transform(&self, x: ArrayView2<f64>) -> Result<Embedding, ReduceError> {
        let p = &self.params;
        let n = x.nrows();
        self.validate(n)?;

        let distances = affinity::pairwise_sq_distances(x);
        let mut joint = affinity::joint_probabilities(&distances, p.perplexity);

        let mut y = match p.init {
            Init::Pca => pca::pca_init(x, p.n_components),
            Init::Random => random_init(n, p.n_components, p.seed),
        };

        let dof = (p.n_components.saturating_sub(1)).max(1) as f64;
        let mut opts = DescentOptions {
            it: 0,
            max_iter: EXPLORATION_ITER,
            momentum: EXPLORATION_MOMENTUM,
            learning_rate: p.learning_rate,
            n_iter_without_progress: EXPLORATION_ITER,
            n_iter_check: N_ITER_CHECK,
            min_gain: MIN_GAIN,
            min_grad_norm: MIN_GRAD_NORM,
            verbose: p.verbose,
        };

        joint *= p.early_exaggeration;
        let mut result = gradient_descent(&mut y, &joint, dof, &opts);
        if p.verbose {
            info!("[t-SNE] 早期放大阶段 {} 轮后 KL 散度：{:.6}", result.it + 1, result.error);
        }

        joint /= p.early_exaggeration;
        if result.it + 1 < p.max_iter {
            opts.it = result.it + 1;
            opts.max_iter = p.max_iter;
            opts.momentum = FINAL_MOMENTUM;
            opts.n_iter_without_progress = N_ITER_WITHOUT_PROGRESS;
            result = gradient_descent(&mut y, &joint, dof, &opts);
        }
        if p.verbose {
            info!("[t-SNE] {} 轮后 KL 散度：{:.6}", result.it + 1, result.error);
        }

        Ok(Embedding { coords: y, kl_divergence: result.error, n_iter: result.it + 1 })
    }
}

/// 以固定种子生成标准差为 1e-4 的高斯初始坐标
fn random_init(n: usize, n_components: usize, seed: u64) -> Array2<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    Array2::from_shape_simple_fn((n, n_components), || {
        RANDOM_INIT_STD * rng.sample::<f64, _>(StandardNormal)
    })
}
