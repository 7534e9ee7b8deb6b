use crate::config::EquationConfig;
use crate::error::Result;
use crate::geometry::{CollocationSet, column_to_tensor, points_to_tensor};
use crate::model::{Axis, DifferentiableField, Jet, Model, tensor_to_vec};
use crate::training::{LossTerm, PinnProblem};
use burn::nn::loss::{MseLoss, Reduction};
use burn::prelude::Backend;
use burn::tensor::Tensor;
use burn::tensor::backend::AutodiffBackend;
use std::f64::consts::PI;

/// 初期条件 u(x, 0) = -sin(nπx)。
pub fn initial_condition(x: f64, wave_number: f64) -> f64 {
    -(wave_number * PI * x).sin()
}

/// 境界 x = ±L でのディリクレ値。
///
/// 初期条件と同じ閉形式を境界のx座標で評価した値で、時間には依存しません。
pub fn boundary_value(x: f64, wave_number: f64) -> f64 {
    initial_condition(x, wave_number)
}

/// 方程式 u_t + λ1·u·u_x - λ2·u_xx = 0 の係数。
///
/// どちらも `[1, 1]` のテンソルで、逆問題では学習パラメータから作られます。
#[derive(Debug, Clone)]
pub struct BurgersCoefficients<B: Backend> {
    pub convection: Tensor<B, 2>,
    pub viscosity: Tensor<B, 2>,
}

impl<B: Backend> BurgersCoefficients<B> {
    /// 定数係数（順問題では λ1 = 1, λ2 = ν）。
    pub fn fixed(convection: f64, viscosity: f64, device: &B::Device) -> Self {
        Self {
            convection: column_to_tensor(&[convection], device),
            viscosity: column_to_tensor(&[viscosity], device),
        }
    }
}

/// バーガース方程式の残差を計算します。
///
/// 移流項と粘性項を左辺に集めた値で、方程式を満たす点では0になります。
pub fn burgers_residual<B: Backend>(
    jet: &Jet<B>,
    coefficients: &BurgersCoefficients<B>,
) -> Tensor<B, 2> {
    let convection = jet.u.clone() * jet.jacobian(Axis::X) * coefficients.convection.clone();
    let diffusion = jet.hessian_xx() * coefficients.viscosity.clone();
    jet.jacobian(Axis::T) + convection - diffusion
}

/// 残差の二乗平均。
pub fn residual_loss<B: Backend>(residual: Tensor<B, 2>) -> Tensor<B, 1> {
    let zeros = Tensor::zeros_like(&residual);
    MseLoss::new().forward(residual, zeros, Reduction::Mean)
}

/// 点列上のPDE残差の二乗平均を勾配なしで評価します。
pub fn residual_mse<B: Backend>(
    model: &Model<B>,
    points: &[[f64; 2]],
    coefficients: &BurgersCoefficients<B>,
    device: &B::Device,
) -> Result<f64> {
    if points.is_empty() {
        return Ok(0.0);
    }
    let jet = model.jet(points_to_tensor(points, device));
    let loss = residual_loss(burgers_residual(&jet, coefficients));
    Ok(tensor_to_vec(loss)?[0])
}

/// 順問題：PDE残差、境界条件、初期条件の3項からなる損失。
pub struct ForwardProblem<B: Backend> {
    domain: Tensor<B, 2>,
    boundary: Tensor<B, 2>,
    boundary_values: Tensor<B, 2>,
    initial: Tensor<B, 2>,
    initial_values: Tensor<B, 2>,
    coefficients: BurgersCoefficients<B>,
}

impl<B: Backend> ForwardProblem<B> {
    pub fn new(equation: &EquationConfig, points: &CollocationSet, device: &B::Device) -> Self {
        let n = equation.wave_number;
        let boundary_values: Vec<f64> = points
            .boundary
            .iter()
            .map(|&[x, _]| boundary_value(x, n))
            .collect();
        let initial_values: Vec<f64> = points
            .initial
            .iter()
            .map(|&[x, _]| initial_condition(x, n))
            .collect();
        Self {
            domain: points_to_tensor(&points.domain, device),
            boundary: points_to_tensor(&points.boundary, device),
            boundary_values: column_to_tensor(&boundary_values, device),
            initial: points_to_tensor(&points.initial, device),
            initial_values: column_to_tensor(&initial_values, device),
            coefficients: BurgersCoefficients::fixed(1.0, equation.viscosity, device),
        }
    }
}

impl<B: AutodiffBackend> PinnProblem<B> for ForwardProblem<B> {
    type Model = Model<B>;

    fn losses(&self, model: &Model<B>) -> Vec<LossTerm<B>> {
        let jet = model.jet(self.domain.clone());
        let residual = burgers_residual(&jet, &self.coefficients);
        let mse = MseLoss::new();
        let pred_bc = model.forward(self.boundary.clone());
        let pred_ic = model.forward(self.initial.clone());
        vec![
            LossTerm::new("pde", residual_loss(residual)),
            LossTerm::new(
                "bc",
                mse.forward(pred_bc, self.boundary_values.clone(), Reduction::Mean),
            ),
            LossTerm::new(
                "ic",
                mse.forward(pred_ic, self.initial_values.clone(), Reduction::Mean),
            ),
        ]
    }
}
