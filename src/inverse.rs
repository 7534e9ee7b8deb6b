//! 逆問題：観測データから方程式の係数 λ1, λ2 を推定します。
//!
//! 方程式は u_t + λ1·u·u_x - λ2·u_xx = 0 で、λ1, λ2 はネットワークの重みと一緒に
//! 学習されるパラメータです。境界・初期条件は課さず、PDE残差と観測データへの
//! 当てはめ（重み付き）だけで学習します。

use crate::Artifacts;
use crate::config::InverseConfig;
use crate::data::{SolutionRow, SolutionTable};
use crate::error::{PinnError, Result};
use crate::forward::predict;
use crate::geometry::{Domain, column_to_tensor, points_to_tensor};
use crate::model::{
    DifferentiableField, FlatParams, Model, param_from_slice, param_gradient, tensor_to_vec,
};
use crate::pinn::{BurgersCoefficients, burgers_residual, residual_loss};
use crate::plot;
use crate::training::{LossHistory, LossTerm, PinnProblem, train};
use burn::module::{AutodiffModule, Module, Param};
use burn::nn::loss::{MseLoss, Reduction};
use burn::prelude::Backend;
use burn::tensor::backend::AutodiffBackend;
use burn::tensor::{Tensor, TensorData};
use log::{info, warn};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::fmt;
use std::time::Instant;

/// 方程式の係数の組。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coefficients {
    pub lambda_1: f64,
    pub lambda_2: f64,
}

impl Coefficients {
    /// 両方の係数が `target` から `tolerance` 以内にあるか。
    pub fn within(&self, target: &Coefficients, tolerance: f64) -> bool {
        (self.lambda_1 - target.lambda_1).abs() <= tolerance
            && (self.lambda_2 - target.lambda_2).abs() <= tolerance
    }
}

impl fmt::Display for Coefficients {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "λ1 = {:.6}, λ2 = {:.6}", self.lambda_1, self.lambda_2)
    }
}

/// 解を近似するネットワークと、学習対象の係数 λ1, λ2。
#[derive(Module, Debug)]
pub struct InverseModel<B: Backend> {
    pub network: Model<B>,
    pub lambda_1: Param<Tensor<B, 1>>,
    pub lambda_2: Param<Tensor<B, 1>>,
}

impl<B: Backend> InverseModel<B> {
    pub fn new(network: Model<B>, initial: Coefficients, device: &B::Device) -> Self {
        let scalar = |value: f64| {
            Param::from_tensor(Tensor::<B, 1>::from_data(
                TensorData::new(vec![value], [1]),
                device,
            ))
        };
        Self {
            network,
            lambda_1: scalar(initial.lambda_1),
            lambda_2: scalar(initial.lambda_2),
        }
    }

    /// 現在の係数の値。
    pub fn coefficients(&self) -> Result<Coefficients> {
        Ok(Coefficients {
            lambda_1: tensor_to_vec(self.lambda_1.val())?[0],
            lambda_2: tensor_to_vec(self.lambda_2.val())?[0],
        })
    }

    /// 残差の計算に使う係数テンソル。勾配は λ1, λ2 へ流れます。
    pub fn burgers_coefficients(&self) -> BurgersCoefficients<B> {
        BurgersCoefficients {
            convection: self.lambda_1.val().reshape([1, 1]),
            viscosity: self.lambda_2.val().reshape([1, 1]),
        }
    }
}

impl<B: AutodiffBackend> FlatParams<B> for InverseModel<B> {
    fn flat_values(&self) -> Result<Vec<f64>> {
        let mut values = self.network.flat_values()?;
        values.extend(tensor_to_vec(self.lambda_1.val())?);
        values.extend(tensor_to_vec(self.lambda_2.val())?);
        Ok(values)
    }

    fn flat_gradients(&self, grads: &B::Gradients) -> Result<Vec<f64>> {
        let mut values = self.network.flat_gradients(grads)?;
        values.extend(param_gradient(&self.lambda_1, grads)?);
        values.extend(param_gradient(&self.lambda_2, grads)?);
        Ok(values)
    }

    fn with_flat_values(&self, values: &[f64]) -> Self {
        let (network, lambdas) = values.split_at(values.len() - 2);
        let mut offset = 0;
        Self {
            network: self.network.with_flat_values(network),
            lambda_1: param_from_slice(&self.lambda_1, lambdas, &mut offset),
            lambda_2: param_from_slice(&self.lambda_2, lambdas, &mut offset),
        }
    }
}

/// 逆問題の損失：PDE残差 + 重み付きの観測データ誤差。
pub struct InverseProblem<B: Backend> {
    domain: Tensor<B, 2>,
    observed: Tensor<B, 2>,
    observed_values: Tensor<B, 2>,
    observation_weight: f64,
}

impl<B: Backend> InverseProblem<B> {
    /// 残差は `domain` の点に加えて観測点でも評価します。
    pub fn new(
        domain: &[[f64; 2]],
        observations: &SolutionTable,
        observation_weight: f64,
        device: &B::Device,
    ) -> Self {
        let inputs = observations.inputs();
        let residual_points: Vec<[f64; 2]> = domain.iter().chain(&inputs).copied().collect();
        Self {
            domain: points_to_tensor(&residual_points, device),
            observed: points_to_tensor(&inputs, device),
            observed_values: column_to_tensor(&observations.outputs(), device),
            observation_weight,
        }
    }
}

impl<B: AutodiffBackend> PinnProblem<B> for InverseProblem<B> {
    type Model = InverseModel<B>;

    fn losses(&self, model: &InverseModel<B>) -> Vec<LossTerm<B>> {
        let jet = model.network.jet(self.domain.clone());
        let residual = burgers_residual(&jet, &model.burgers_coefficients());
        let pred = model.network.forward(self.observed.clone());
        let data = MseLoss::new().forward(pred, self.observed_values.clone(), Reduction::Mean);
        vec![
            LossTerm::new("pde", residual_loss(residual)),
            LossTerm::weighted("data", self.observation_weight, data),
        ]
    }
}

/// 逆問題の結果。
pub struct InverseOutcome<B: AutodiffBackend> {
    pub model: InverseModel<B>,
    pub initial: Coefficients,
    pub learned: Coefficients,
    pub target: Coefficients,
    /// 観測点での学習後の予測値。
    pub predictions: SolutionTable,
    pub history: LossHistory,
}

impl<B: AutodiffBackend> InverseOutcome<B> {
    /// 推定結果を標準出力に表示します。
    pub fn print_report(&self, tolerance: f64) {
        println!("--- 係数の推定結果 ---");
        println!("  学習前: {}", self.initial);
        println!("  学習後: {}", self.learned);
        println!("  目標値: {}", self.target);
        println!(
            "  誤差:   |Δλ1| = {:.6}, |Δλ2| = {:.6}",
            (self.learned.lambda_1 - self.target.lambda_1).abs(),
            (self.learned.lambda_2 - self.target.lambda_2).abs()
        );
        if self.learned.within(&self.target, tolerance) {
            println!("=> 許容誤差 {} 以内で目標値を再現しました。", tolerance);
        } else {
            println!("=> 許容誤差 {} を超えています。", tolerance);
        }
    }
}

/// 逆問題を解きます。
///
/// `observations` は順問題の出力表で、同じプロセス内ならメモリ上の値を、
/// 別プロセスならファイルから読み込んだ値を渡します。
pub fn run_inverse<B: AutodiffBackend>(
    config: &InverseConfig,
    observations: &SolutionTable,
    device: &B::Device,
) -> Result<InverseOutcome<B>> {
    if observations.is_empty() {
        return Err(PinnError::NoObservations);
    }
    B::seed(config.training.seed);
    let mut rng = StdRng::seed_from_u64(config.training.seed);

    let domain = Domain::new(config.equation.length, config.equation.duration);
    let outside = observations
        .rows()
        .iter()
        .filter(|row| !domain.contains(row.x, row.t))
        .count();
    if outside > 0 {
        warn!("観測データのうち {} 点が計算領域の外にあります", outside);
    }
    let points = domain.sample_interior(config.num_domain, &mut rng);
    let problem = InverseProblem::new(&points, observations, config.observation_weight, device);

    let initial = Coefficients {
        lambda_1: config.lambda_1_init,
        lambda_2: config.lambda_2_init,
    };
    let target = Coefficients {
        lambda_1: config.lambda_1_target,
        lambda_2: config.lambda_2_target,
    };
    let model = InverseModel::new(config.model.init::<B>(device), initial, device);
    let initial = model.coefficients()?;
    println!("学習前の係数: {}", initial);
    info!(
        "逆問題の学習を開始します: 観測 {} 点, 内部点 {} 点, 観測データの重み {}",
        observations.len(),
        points.len(),
        config.observation_weight
    );

    let training_start = Instant::now();
    let (model, history) = train::<B, _>(&problem, model, &config.training)?;
    info!("=> 学習時間: {:.2?}", training_start.elapsed());

    let learned = model.coefficients()?;
    println!("学習後の係数: {}", learned);

    let network = model.network.valid();
    let inputs = observations.inputs();
    let values = predict(&network, &inputs, device)?;
    let predictions = SolutionTable::from_rows(
        inputs
            .iter()
            .zip(values)
            .map(|(&[x, t], u)| SolutionRow { x, t, u })
            .collect(),
    );

    Ok(InverseOutcome {
        model,
        initial,
        learned,
        target,
        predictions,
        history,
    })
}

/// 比較図と損失グラフを書き出します。描画の失敗は警告のみです。
pub fn persist<B: AutodiffBackend>(
    outcome: &InverseOutcome<B>,
    observations: &SolutionTable,
    config: &InverseConfig,
    artifacts: &Artifacts,
) {
    let x_range = (-config.equation.length, config.equation.length);
    match plot::plot_comparison(
        &artifacts.comparison_plot,
        observations,
        &outcome.predictions,
        x_range,
    ) {
        Ok(()) => info!("=> 比較グラフを '{}' に保存しました。", artifacts.comparison_plot.display()),
        Err(e) => warn!("比較グラフの描画に失敗しました: {}", e),
    }
    match plot::plot_loss_history(&artifacts.inverse_loss, &outcome.history) {
        Ok(()) => info!("=> 損失グラフを '{}' に保存しました。", artifacts.inverse_loss.display()),
        Err(e) => warn!("損失グラフの描画に失敗しました: {}", e),
    }
}
