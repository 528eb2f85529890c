use criterion::{Criterion, black_box, criterion_group, criterion_main};
use embedscape::tsne::{Init, Tsne, TsneParams};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

// 生成有聚类模式的测试数据，规模与一个风格的标签数量相当
fn generate_clustered_data(n: usize, d: usize, num_clusters: usize) -> Array2<f64> {
    let mut rng = StdRng::seed_from_u64(42);
    let centers: Vec<Vec<f64>> =
        (0..num_clusters).map(|_| (0..d).map(|_| rng.random_range(-1.0..1.0)).collect()).collect();
    Array2::from_shape_fn((n, d), |(i, j)| centers[i % num_clusters][j] + 0.05 * ((i * 31 + j * 17) % 13) as f64)
}

fn bench_tsne(c: &mut Criterion) {
    let mut group = c.benchmark_group("tsne_exact");
    group.sample_size(10);

    for (n, d) in black_box(vec![(100, 384), (300, 384)]) {
        let data = black_box(generate_clustered_data(n, d, 8));

        for init in [Init::Pca, Init::Random] {
            let tsne = Tsne::new(TsneParams { init, ..Default::default() });
            group.bench_function(format!("{init:?}_{n}x{d}"), |b| b.iter(|| tsne.fit_transform(data.view())));
        }
    }

    group.finish();
}

criterion_group!(benches, bench_tsne);
criterion_main!(benches);
