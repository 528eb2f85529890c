use log::debug;
use ndarray::prelude::*;

use super::MACHINE_EPSILON;

/// 二分搜索最大步数
const BINARY_SEARCH_STEPS: usize = 100;
/// 熵的容差
const ENTROPY_TOLERANCE: f64 = 1e-5;
/// 条件概率之和为 0 时的替代值
const EPSILON_DBL: f64 = 1e-8;

/// 计算所有点对的平方欧氏距离
pub(crate) fn pairwise_sq_distances(x: ArrayView2<f64>) -> Array2<f64> {
    let n = x.nrows();
    let mut d = Array2::zeros((n, n));
    for i in 0..n {
        for j in (i + 1)..n {
            let mut sum = 0.0;
            for (a, b) in x.row(i).iter().zip(x.row(j).iter()) {
                let diff = a - b;
                sum += diff * diff;
            }
            d[[i, j]] = sum;
            d[[j, i]] = sum;
        }
    }
    d
}

/// 对每个点二分搜索高斯核精度 beta，使条件分布的熵等于 ln(perplexity)
///
/// 返回按行归一化的条件概率矩阵，对角线为 0
pub(crate) fn binary_search_perplexity(distances: &Array2<f64>, perplexity: f64) -> Array2<f64> {
    let n = distances.nrows();
    let desired_entropy = perplexity.ln();
    let mut p = Array2::zeros((n, n));
    let mut beta_sum = 0.0;

    for i in 0..n {
        let mut beta_min = f64::NEG_INFINITY;
        let mut beta_max = f64::INFINITY;
        let mut beta = 1.0;

        for _ in 0..BINARY_SEARCH_STEPS {
            let mut sum_p = 0.0;
            for j in 0..n {
                let v = if j != i { (-distances[[i, j]] * beta).exp() } else { 0.0 };
                p[[i, j]] = v;
                sum_p += v;
            }
            if sum_p == 0.0 {
                sum_p = EPSILON_DBL;
            }

            let mut sum_disti_p = 0.0;
            for j in 0..n {
                p[[i, j]] /= sum_p;
                sum_disti_p += distances[[i, j]] * p[[i, j]];
            }

            let entropy = sum_p.ln() + beta * sum_disti_p;
            let diff = entropy - desired_entropy;
            if diff.abs() <= ENTROPY_TOLERANCE {
                break;
            }

            if diff > 0.0 {
                beta_min = beta;
                beta = if beta_max == f64::INFINITY { beta * 2.0 } else { (beta + beta_max) / 2.0 };
            } else {
                beta_max = beta;
                beta = if beta_min == f64::NEG_INFINITY { beta / 2.0 } else { (beta + beta_min) / 2.0 };
            }
        }

        beta_sum += beta;
    }

    debug!("[t-SNE] 平均 sigma: {:.6}", (n as f64 / beta_sum).sqrt());
    p
}

/// 计算对称化的联合概率 P = (P_cond + P_condᵀ) / sum，非对角元素下限为机器精度
pub(crate) fn joint_probabilities(distances: &Array2<f64>, perplexity: f64) -> Array2<f64> {
    let conditional = binary_search_perplexity(distances, perplexity);
    let n = conditional.nrows();

    let mut p = &conditional + &conditional.t();
    let sum_p = p.sum().max(MACHINE_EPSILON);
    for i in 0..n {
        for j in 0..n {
            p[[i, j]] = if i == j { 0.0 } else { (p[[i, j]] / sum_p).max(MACHINE_EPSILON) };
        }
    }
    p
}
