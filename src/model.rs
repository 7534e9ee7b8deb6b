use crate::error::{PinnError, Result as PinnResult};
use burn::config::Config;
use burn::module::{Module, Param};
use burn::nn::{Initializer, Linear, LinearConfig, Tanh};
use burn::prelude::Backend;
use burn::tensor::backend::AutodiffBackend;
use burn::tensor::{Tensor, TensorData};

/// ネットワーク構造の設定。
#[derive(Config, Debug)]
pub struct ModelConfig {
    /// 入力座標の次元（x, t）。
    #[config(default = 2)]
    pub input_size: usize,
    #[config(default = 7)]
    pub hidden_layers: usize,
    #[config(default = 50)]
    pub hidden_size: usize,
    #[config(default = 1)]
    pub output_size: usize,
}

impl ModelConfig {
    /// 各層の幅。`hidden_layers = 0` なら入力から出力への線形写像だけになります。
    pub fn widths(&self) -> Vec<usize> {
        let mut widths = vec![self.input_size];
        widths.extend(std::iter::repeat_n(self.hidden_size, self.hidden_layers));
        widths.push(self.output_size);
        widths
    }

    /// 重みをGlorot正規分布、バイアスを0で初期化したモデルを生成します。
    pub fn init<B: Backend>(&self, device: &B::Device) -> Model<B> {
        let initializer = Initializer::XavierNormal { gain: 1.0 };
        let linears = self
            .widths()
            .windows(2)
            .map(|pair| {
                let mut linear = LinearConfig::new(pair[0], pair[1])
                    .with_initializer(initializer.clone())
                    .init(device);
                linear.bias = linear
                    .bias
                    .map(|bias| Param::from_tensor(Tensor::zeros_like(&bias.val())));
                linear
            })
            .collect();
        Model {
            linears,
            activation: Tanh::new(),
        }
    }
}

/// PINNの本体となるニューラルネットワークモデル。
///
/// 座標(x, t)を入力とし、その点における解uを予測する多層パーセプトロン（MLP）です。
#[derive(Module, Debug)]
pub struct Model<B: Backend> {
    linears: Vec<Linear<B>>,
    activation: Tanh,
}

impl<B: Backend> Model<B> {
    /// モデルの順伝播を実行します。
    pub fn forward(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        let last = self.linears.len() - 1;
        let mut x = input;
        for (i, linear) in self.linears.iter().enumerate() {
            x = linear.forward(x);
            if i < last {
                x = self.activation.forward(x);
            }
        }
        x
    }
}

/// 入力座標の軸。テンソルの列番号と一致します。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X = 0,
    T = 1,
}

/// 出力uとその入力座標に関する微分をまとめたもの。
///
/// すべて `[N, 1]` の形状で、重みに対しては通常のテンソル演算として
/// 計算グラフに残るため、損失から逆伝播できます。
#[derive(Debug, Clone)]
pub struct Jet<B: Backend> {
    pub u: Tensor<B, 2>,
    pub u_x: Tensor<B, 2>,
    pub u_t: Tensor<B, 2>,
    pub u_xx: Tensor<B, 2>,
}

impl<B: Backend> Jet<B> {
    /// ∂u/∂(axis)
    pub fn jacobian(&self, axis: Axis) -> Tensor<B, 2> {
        match axis {
            Axis::X => self.u_x.clone(),
            Axis::T => self.u_t.clone(),
        }
    }

    /// ∂²u/∂x²
    pub fn hessian_xx(&self) -> Tensor<B, 2> {
        self.u_xx.clone()
    }
}

/// 入力座標について微分可能な場。
pub trait DifferentiableField<B: Backend> {
    /// 座標 `[N, 2]` における値と微分を返します。
    fn jet(&self, coords: Tensor<B, 2>) -> Jet<B>;
}

impl<B: Backend> DifferentiableField<B> for Model<B> {
    /// 各層で (値, ∂x, ∂t, ∂²x) を前進モードで伝播させます。
    ///
    /// 線形層 z = aW + b では微分はWとの積、tanh層 h = tanh(z) では
    /// h' = (1 - h²) z'、h'' = (1 - h²) z'' - 2h(1 - h²) z'² となります。
    fn jet(&self, coords: Tensor<B, 2>) -> Jet<B> {
        let device = coords.device();
        let n = coords.dims()[0];
        let seed = |values: [f32; 2]| {
            Tensor::<B, 2>::from_data(TensorData::new(values.repeat(n), [n, 2]), &device)
        };
        let last = self.linears.len() - 1;

        let mut value = coords;
        let mut d_x = seed([1.0, 0.0]);
        let mut d_t = seed([0.0, 1.0]);
        let mut d_xx: Option<Tensor<B, 2>> = None;

        for linear in &self.linears[..last] {
            let weight = linear.weight.val();
            let z = linear.forward(value);
            let z_x = d_x.matmul(weight.clone());
            let z_t = d_t.matmul(weight.clone());
            let z_xx = d_xx.map(|d| d.matmul(weight));

            let h = self.activation.forward(z);
            let slope = Tensor::ones_like(&h) - h.clone() * h.clone();
            let curvature = (h.clone() * slope.clone()).mul_scalar(-2.0);
            let second = curvature * z_x.clone() * z_x.clone();
            d_xx = Some(match z_xx {
                Some(z_xx) => slope.clone() * z_xx + second,
                None => second,
            });
            d_x = slope.clone() * z_x;
            d_t = slope * z_t;
            value = h;
        }

        let output = &self.linears[last];
        let weight = output.weight.val();
        let u = output.forward(value);
        let u_xx = match d_xx {
            Some(d_xx) => d_xx.matmul(weight.clone()),
            None => Tensor::zeros_like(&u),
        };
        Jet {
            u,
            u_x: d_x.matmul(weight.clone()),
            u_t: d_t.matmul(weight),
            u_xx,
        }
    }
}

/// 全学習パラメータを1本の`f64`ベクタとして扱うためのビュー。
///
/// L-BFGSのようにパラメータ全体の内積を必要とする最適化手法で使います。
/// 並び順は `flat_values`、`flat_gradients`、`with_flat_values` で共通です。
pub trait FlatParams<B: AutodiffBackend>: Sized {
    fn flat_values(&self) -> PinnResult<Vec<f64>>;
    fn flat_gradients(&self, grads: &B::Gradients) -> PinnResult<Vec<f64>>;
    /// 値だけを差し替えた新しいモジュールを返します。
    fn with_flat_values(&self, values: &[f64]) -> Self;
}

impl<B: AutodiffBackend> FlatParams<B> for Model<B> {
    fn flat_values(&self) -> PinnResult<Vec<f64>> {
        let mut values = Vec::new();
        for linear in &self.linears {
            values.extend(tensor_to_vec(linear.weight.val())?);
            if let Some(bias) = &linear.bias {
                values.extend(tensor_to_vec(bias.val())?);
            }
        }
        Ok(values)
    }

    fn flat_gradients(&self, grads: &B::Gradients) -> PinnResult<Vec<f64>> {
        let mut values = Vec::new();
        for linear in &self.linears {
            values.extend(param_gradient(&linear.weight, grads)?);
            if let Some(bias) = &linear.bias {
                values.extend(param_gradient(bias, grads)?);
            }
        }
        Ok(values)
    }

    fn with_flat_values(&self, values: &[f64]) -> Self {
        let mut offset = 0;
        let linears = self
            .linears
            .iter()
            .map(|linear| {
                let mut linear = linear.clone();
                linear.weight = param_from_slice(&linear.weight, values, &mut offset);
                linear.bias = linear
                    .bias
                    .as_ref()
                    .map(|bias| param_from_slice(bias, values, &mut offset));
                linear
            })
            .collect();
        Self {
            linears,
            activation: self.activation.clone(),
        }
    }
}

/// テンソルの要素を行優先で`f64`ベクタに取り出します。
pub fn tensor_to_vec<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> PinnResult<Vec<f64>> {
    tensor
        .into_data()
        .convert::<f64>()
        .into_vec::<f64>()
        .map_err(|e| PinnError::Tensor(format!("{:?}", e)))
}

pub(crate) fn param_gradient<B: AutodiffBackend, const D: usize>(
    param: &Param<Tensor<B, D>>,
    grads: &B::Gradients,
) -> PinnResult<Vec<f64>> {
    let tensor = param.val();
    match tensor.grad(grads) {
        Some(grad) => tensor_to_vec(grad),
        None => Ok(vec![0.0; tensor.dims().iter().product()]),
    }
}

pub(crate) fn param_from_slice<B: Backend, const D: usize>(
    param: &Param<Tensor<B, D>>,
    values: &[f64],
    offset: &mut usize,
) -> Param<Tensor<B, D>> {
    let tensor = param.val();
    let shape = tensor.dims();
    let numel: usize = shape.iter().product();
    let data = TensorData::new(values[*offset..*offset + numel].to_vec(), shape);
    *offset += numel;
    Param::from_tensor(Tensor::from_data(data, &tensor.device()))
}
