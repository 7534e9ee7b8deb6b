//! # 物理情報ニューラルネットワーク (PINN) ライブラリ
//!
//! `burn` フレームワークを使用して、物理情報ニューラルネットワーク（PINN）を構築し、
//! 1次元のバーガース方程式 u_t + u·u_x = ν·u_xx を解くための主要なコンポーネントを提供します。
//!
//! - 順問題：方程式と初期・境界条件から解 u(x, t) を学習します。
//! - 逆問題：順問題の出力を観測データとして、方程式の係数 λ1, λ2 を推定します。
//!
//! 2つの段階は解データファイル（[`SOLUTION_FILENAME`]）またはメモリ上の
//! [`data::SolutionTable`] で受け渡します。

use burn::backend::{Autodiff, NdArray};
use std::path::{Path, PathBuf};

pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod forward;
pub mod geometry;
pub mod inference;
pub mod inverse;
pub mod lbfgs;
pub mod model;
pub mod pinn;
pub mod plot;
pub mod training;

/// 学習に使うバックエンド。
pub type TrainingBackend = Autodiff<NdArray<f32>>;
/// 推論だけを行うバックエンド。
pub type InferenceBackend = NdArray<f32>;

/// 順問題の解を書き出し、逆問題が読み込むファイル名
pub const SOLUTION_FILENAME: &str = "forward_solution.dat";
/// 順問題の解を代表時刻ごとに描いた図
pub const SOLUTION_PLOT_FILENAME: &str = "forward_solution_subplots.png";
/// 観測データと逆問題の予測を重ねた図
pub const COMPARISON_PLOT_FILENAME: &str = "comparison.png";
/// 学習済みの順問題モデル
pub const MODEL_FILENAME: &str = "forward_model.mpk";
pub const FORWARD_LOSS_FILENAME: &str = "forward_loss.png";
pub const INVERSE_LOSS_FILENAME: &str = "inverse_loss.png";

/// 出力ファイルのパス一式。
#[derive(Debug, Clone)]
pub struct Artifacts {
    pub solution: PathBuf,
    pub solution_plot: PathBuf,
    pub comparison_plot: PathBuf,
    pub model: PathBuf,
    pub forward_loss: PathBuf,
    pub inverse_loss: PathBuf,
}

impl Artifacts {
    /// `dir` 直下に既定のファイル名で配置します。
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            solution: dir.join(SOLUTION_FILENAME),
            solution_plot: dir.join(SOLUTION_PLOT_FILENAME),
            comparison_plot: dir.join(COMPARISON_PLOT_FILENAME),
            model: dir.join(MODEL_FILENAME),
            forward_loss: dir.join(FORWARD_LOSS_FILENAME),
            inverse_loss: dir.join(INVERSE_LOSS_FILENAME),
        }
    }
}
