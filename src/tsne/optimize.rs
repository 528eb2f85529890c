use log::info;
use ndarray::prelude::*;

use super::MACHINE_EPSILON;

/// 梯度下降每个阶段的参数
#[derive(Debug, Clone)]
pub(crate) struct DescentOptions {
    /// 起始迭代序号
    pub it: usize,
    /// 迭代序号上限（不含）
    pub max_iter: usize,
    pub momentum: f64,
    pub learning_rate: f64,
    /// 连续多少轮 KL 散度没有下降则提前停止
    pub n_iter_without_progress: usize,
    pub n_iter_check: usize,
    pub min_gain: f64,
    pub min_grad_norm: f64,
    pub verbose: bool,
}

/// 梯度下降的结果
#[derive(Debug, Clone, Copy)]
pub(crate) struct DescentResult {
    /// 最后一次计算得到的 KL 散度
    pub error: f64,
    /// 最后一轮的迭代序号
    pub it: usize,
}

/// 计算嵌入 y 在联合概率 p 下的 KL 散度及其梯度
///
/// 低维空间使用自由度为 dof 的 Student-t 分布 w = (1 + d/dof)^(-(dof+1)/2)，
/// 梯度为 2(dof+1)/dof · Σ_j (p_ij - q_ij)(1 + d_ij/dof)^-1 (y_i - y_j)。
/// 只有 compute_error 为真时才计算 KL 散度，否则返回 NaN。
pub(crate) fn kl_divergence(
    y: &Array2<f64>,
    p: &Array2<f64>,
    dof: f64,
    compute_error: bool,
    grad: &mut Array2<f64>,
) -> f64 {
    let (n, dim) = y.dim();
    let exponent = (dof + 1.0) / -2.0;

    // kernel = (1 + d/dof)^-1，num = kernel^((dof+1)/2)
    let mut kernel = Array2::<f64>::zeros((n, n));
    let mut num = Array2::<f64>::zeros((n, n));
    let mut sum_num = 0.0;
    for i in 0..n {
        for j in (i + 1)..n {
            let mut d = 0.0;
            for k in 0..dim {
                let diff = y[[i, k]] - y[[j, k]];
                d += diff * diff;
            }
            let base = d / dof + 1.0;
            let v = base.powf(exponent);
            kernel[[i, j]] = 1.0 / base;
            kernel[[j, i]] = 1.0 / base;
            num[[i, j]] = v;
            num[[j, i]] = v;
            sum_num += 2.0 * v;
        }
    }

    let mut kl = f64::NAN;
    if compute_error {
        kl = 0.0;
        for i in 0..n {
            for j in 0..n {
                if i != j {
                    let q = (num[[i, j]] / sum_num).max(MACHINE_EPSILON);
                    let pij = p[[i, j]];
                    kl += pij * (pij.max(MACHINE_EPSILON) / q).ln();
                }
            }
        }
    }

    let c = 2.0 * (dof + 1.0) / dof;
    grad.fill(0.0);
    for i in 0..n {
        for j in 0..n {
            if i == j {
                continue;
            }
            let q = (num[[i, j]] / sum_num).max(MACHINE_EPSILON);
            let pq = (p[[i, j]] - q) * kernel[[i, j]];
            for k in 0..dim {
                grad[[i, k]] += pq * (y[[i, k]] - y[[j, k]]);
            }
        }
        for k in 0..dim {
            grad[[i, k]] *= c;
        }
    }

    kl
}

/// 带动量和自适应增益的梯度下降
///
/// 每 n_iter_check 轮检查一次收敛：梯度范数足够小，或 KL 散度长时间没有改善时停止。
/// 动量和增益在每次调用时重新初始化。
pub(crate) fn gradient_descent(
    y: &mut Array2<f64>,
    p: &Array2<f64>,
    dof: f64,
    opts: &DescentOptions,
) -> DescentResult {
    let mut update = Array2::<f64>::zeros(y.raw_dim());
    let mut gains = Array2::<f64>::ones(y.raw_dim());
    let mut grad = Array2::<f64>::zeros(y.raw_dim());

    let mut error = f64::MAX;
    let mut best_error = f64::MAX;
    let mut best_iter = opts.it;
    let mut i = opts.it;

    while i < opts.max_iter {
        let check_convergence = (i + 1) % opts.n_iter_check == 0;
        let compute_error = check_convergence || i == opts.max_iter - 1;

        let e = kl_divergence(y, p, dof, compute_error, &mut grad);
        if compute_error {
            error = e;
        }

        azip!((g in &mut grad, gain in &mut gains, u in &update) {
            if *u * *g < 0.0 {
                *gain += 0.2;
            } else {
                *gain *= 0.8;
            }
            if *gain < opts.min_gain {
                *gain = opts.min_gain;
            }
            *g *= *gain;
        });
        azip!((u in &mut update, &g in &grad) {
            *u = opts.momentum * *u - opts.learning_rate * g;
        });
        *y += &update;

        if check_convergence {
            let grad_norm = grad.iter().map(|g| g * g).sum::<f64>().sqrt();
            if opts.verbose {
                info!("[t-SNE] 第 {} 轮：KL 散度 = {:.7}，梯度范数 = {:.7}", i + 1, error, grad_norm);
            }

            if error < best_error {
                best_error = error;
                best_iter = i;
            } else if i - best_iter > opts.n_iter_without_progress {
                if opts.verbose {
                    info!("[t-SNE] 第 {} 轮：{} 轮内没有进展，停止迭代", i + 1, opts.n_iter_without_progress);
                }
                break;
            }
            if grad_norm <= opts.min_grad_norm {
                if opts.verbose {
                    info!("[t-SNE] 第 {} 轮：梯度范数 {:.7}，停止迭代", i + 1, grad_norm);
                }
                break;
            }
        }

        i += 1;
    }

    DescentResult { error, it: i.min(opts.max_iter.saturating_sub(1)) }
}
