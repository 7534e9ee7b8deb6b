//! 計算領域 [-L, L] × [0, T] とコロケーション点のサンプリング。

use crate::config::SamplingConfig;
use burn::prelude::Backend;
use burn::tensor::{Tensor, TensorData};
use rand::Rng;

/// 空間区間と時間区間の直積で表される矩形領域。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Domain {
    pub x_min: f64,
    pub x_max: f64,
    pub t_min: f64,
    pub t_max: f64,
}

impl Domain {
    /// [-length, length] × [0, duration] を作ります。
    pub fn new(length: f64, duration: f64) -> Self {
        Self {
            x_min: -length,
            x_max: length,
            t_min: 0.0,
            t_max: duration,
        }
    }

    pub fn contains(&self, x: f64, t: f64) -> bool {
        (self.x_min..=self.x_max).contains(&x) && (self.t_min..=self.t_max).contains(&t)
    }

    /// 空間方向に等間隔な `n` 点（両端を含む）。
    pub fn spatial_grid(&self, n: usize) -> Vec<f64> {
        linspace(self.x_min, self.x_max, n)
    }

    /// 出力に使う代表時刻。`n = 5` なら {0, 0.25, 0.5, 0.75, 1}·T。
    pub fn time_steps(&self, n: usize) -> Vec<f64> {
        linspace(self.t_min, self.t_max, n)
    }

    /// 領域内部から一様に `n` 点を抽出します。
    pub fn sample_interior<R: Rng>(&self, n: usize, rng: &mut R) -> Vec<[f64; 2]> {
        (0..n)
            .map(|_| {
                [
                    rng.random_range(self.x_min..self.x_max),
                    rng.random_range(self.t_min..self.t_max),
                ]
            })
            .collect()
    }

    /// 空間境界 x = -L, x = L 上の点。左右交互に置き、時刻は一様に抽出します。
    pub fn sample_boundary<R: Rng>(&self, n: usize, rng: &mut R) -> Vec<[f64; 2]> {
        (0..n)
            .map(|i| {
                let x = if i % 2 == 0 { self.x_min } else { self.x_max };
                [x, rng.random_range(self.t_min..self.t_max)]
            })
            .collect()
    }

    /// 初期時刻 t = 0 上の点。
    pub fn sample_initial<R: Rng>(&self, n: usize, rng: &mut R) -> Vec<[f64; 2]> {
        (0..n)
            .map(|_| [rng.random_range(self.x_min..self.x_max), self.t_min])
            .collect()
    }
}

/// 学習に使うコロケーション点の3分類。
#[derive(Debug, Clone)]
pub struct CollocationSet {
    /// PDE残差を評価する内部点。
    pub domain: Vec<[f64; 2]>,
    /// ディリクレ境界条件を課す点。
    pub boundary: Vec<[f64; 2]>,
    /// 初期条件を課す点。
    pub initial: Vec<[f64; 2]>,
}

impl CollocationSet {
    pub fn sample<R: Rng>(domain: &Domain, sampling: &SamplingConfig, rng: &mut R) -> Self {
        Self {
            domain: domain.sample_interior(sampling.num_domain, rng),
            boundary: domain.sample_boundary(sampling.num_boundary, rng),
            initial: domain.sample_initial(sampling.num_initial, rng),
        }
    }
}

/// `start` から `end` までの等間隔な `n` 点（numpyの`linspace`と同じ）。
pub fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (n - 1) as f64;
            (0..n)
                .map(|i| if i == n - 1 { end } else { start + step * i as f64 })
                .collect()
        }
    }
}

/// 座標のリストを `[N, 2]` テンソルに変換します。
pub fn points_to_tensor<B: Backend>(points: &[[f64; 2]], device: &B::Device) -> Tensor<B, 2> {
    let flat: Vec<f64> = points.iter().flatten().copied().collect();
    Tensor::from_data(TensorData::new(flat, [points.len(), 2]), device)
}

/// 値のリストを `[N, 1]` テンソルに変換します。
pub fn column_to_tensor<B: Backend>(values: &[f64], device: &B::Device) -> Tensor<B, 2> {
    Tensor::from_data(TensorData::new(values.to_vec(), [values.len(), 1]), device)
}
