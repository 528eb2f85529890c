use nalgebra::{DMatrix, SymmetricEigen};
use ndarray::prelude::*;

/// PCA 初始化后第一维的标准差
const INIT_SCALE: f64 = 1e-4;

/// 计算对称矩阵的特征值和特征向量
///
/// 返回的特征值按降序排列，值相同时保持原有顺序，特征向量为对应的列。
pub(crate) fn symmetric_eigen(a: &Array2<f64>) -> (Array1<f64>, Array2<f64>) {
    let n = a.nrows();
    assert_eq!(n, a.ncols(), "matrix must be square");

    let eigen = SymmetricEigen::new(DMatrix::from_fn(n, n, |i, j| a[[i, j]]));

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&i, &j| eigen.eigenvalues[j].total_cmp(&eigen.eigenvalues[i]));

    let values = Array1::from_iter(order.iter().map(|&i| eigen.eigenvalues[i]));
    let vectors = Array2::from_shape_fn((n, n), |(row, col)| eigen.eigenvectors[(row, order[col])]);
    (values, vectors)
}

/// 将中心化后的输入投影到方差最大的 n_components 个方向上
///
/// 通过 N×N 的 Gram 矩阵求解，对高维少样本的输入更快。
/// 每个主成分的载荷向量（输入空间中的方向）中绝对值最大的分量取正号，
/// 以消除特征向量的符号不确定性。
pub(crate) fn principal_components(x: ArrayView2<f64>, n_components: usize) -> Array2<f64> {
    let n = x.nrows();
    let mut out = Array2::zeros((n, n_components));

    let Some(mean) = x.mean_axis(Axis(0)) else {
        return out;
    };
    let centered = &x - &mean;
    let gram = centered.dot(&centered.t());
    let (values, vectors) = symmetric_eigen(&gram);

    for k in 0..n_components.min(n) {
        let u = vectors.column(k);
        let sigma = values[k].max(0.0).sqrt();

        // 载荷与 Xᵀu 同向，只需要它的符号
        let loading = centered.t().dot(&u);
        let mut pivot = 0;
        for j in 1..loading.len() {
            if loading[j].abs() > loading[pivot].abs() {
                pivot = j;
            }
        }
        let sign = if loading.get(pivot).is_some_and(|&l| l < 0.0) { -1.0 } else { 1.0 };

        for i in 0..n {
            out[[i, k]] = sign * u[i] * sigma;
        }
    }
    out
}

/// t-SNE 的 PCA 初始化：取主成分后缩放，使第一维标准差为 1e-4
pub(crate) fn pca_init(x: ArrayView2<f64>, n_components: usize) -> Array2<f64> {
    let mut y = principal_components(x, n_components);
    let std = y.column(0).std(0.0);
    if std > 0.0 && std.is_finite() {
        y.mapv_inplace(|v| v / std * INIT_SCALE);
    }
    y
}
