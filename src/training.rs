use crate::config::TrainingConfig;
use crate::error::{PinnError, Result};
use crate::lbfgs;
use crate::model::FlatParams;
use argmin::core::{CostFunction, Error as ArgminError, Gradient};
use burn::module::AutodiffModule;
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::prelude::Backend;
use burn::tensor::backend::AutodiffBackend;
use burn::tensor::{ElementConversion, Tensor};
use log::info;
use std::marker::PhantomData;
use std::time::Instant;

/// 損失を構成する1項。
pub struct LossTerm<B: Backend> {
    pub name: &'static str,
    pub weight: f64,
    pub value: Tensor<B, 1>,
}

impl<B: Backend> LossTerm<B> {
    pub fn new(name: &'static str, value: Tensor<B, 1>) -> Self {
        Self::weighted(name, 1.0, value)
    }

    pub fn weighted(name: &'static str, weight: f64, value: Tensor<B, 1>) -> Self {
        Self {
            name,
            weight,
            value,
        }
    }
}

/// 学習対象の問題。モデルを受け取り、損失の各項を返します。
pub trait PinnProblem<B: AutodiffBackend> {
    type Model: AutodiffModule<B> + FlatParams<B>;

    /// 少なくとも1項を返す必要があります。
    fn losses(&self, model: &Self::Model) -> Vec<LossTerm<B>>;
}

/// 各項の重み付き和。
pub fn total_loss<B: Backend>(terms: &[LossTerm<B>]) -> Tensor<B, 1> {
    let weighted = terms
        .iter()
        .map(|term| term.value.clone().mul_scalar(term.weight))
        .collect();
    Tensor::cat(weighted, 0).sum()
}

/// 最適化のフェーズ。Adamで粗く収束させた後、L-BFGSで仕上げます。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Adam,
    Lbfgs,
}

impl Phase {
    pub fn name(self) -> &'static str {
        match self {
            Phase::Adam => "Adam",
            Phase::Lbfgs => "L-BFGS",
        }
    }
}

/// ある時点の損失。`step` は2つのフェーズを通した通算の反復数です。
#[derive(Debug, Clone)]
pub struct LossRecord {
    pub phase: Phase,
    pub step: usize,
    pub total: f64,
    /// 項ごとの値（重み適用前）。L-BFGSの途中経過では空です。
    pub terms: Vec<(&'static str, f64)>,
}

impl LossRecord {
    fn capture<B: Backend>(phase: Phase, step: usize, terms: &[LossTerm<B>]) -> Self {
        let scalar = |tensor: Tensor<B, 1>| tensor.into_scalar().elem::<f64>();
        Self {
            phase,
            step,
            total: scalar(total_loss(terms)),
            terms: terms
                .iter()
                .map(|term| (term.name, scalar(term.value.clone())))
                .collect(),
        }
    }

    /// 名前で項の値を引きます。
    pub fn term(&self, name: &str) -> Option<f64> {
        self.terms
            .iter()
            .find(|(term, _)| *term == name)
            .map(|&(_, value)| value)
    }
}

/// 学習過程の損失の記録。
#[derive(Debug, Clone, Default)]
pub struct LossHistory {
    records: Vec<LossRecord>,
}

impl LossHistory {
    pub fn records(&self) -> &[LossRecord] {
        &self.records
    }

    pub fn last(&self) -> Option<&LossRecord> {
        self.records.last()
    }

    fn push(&mut self, record: LossRecord) {
        let terms = record
            .terms
            .iter()
            .map(|(name, value)| format!("{}: {:.6e}", name, value))
            .collect::<Vec<_>>()
            .join(", ");
        info!(
            "[{} {}] Total Loss: {:.6e} {}",
            record.phase.name(),
            record.step,
            record.total,
            terms
        );
        self.records.push(record);
    }
}

fn ensure_finite(phase: Phase, value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(PinnError::NonFiniteLoss {
            phase: phase.name(),
            value,
        })
    }
}

/// Adam → L-BFGS の2段階で学習します。
///
/// 各フェーズの終了時に損失が有限値であることを確認し、
/// そうでなければ`NonFiniteLoss`で学習全体を打ち切ります。
pub fn train<B, P>(
    problem: &P,
    model: P::Model,
    config: &TrainingConfig,
) -> Result<(P::Model, LossHistory)>
where
    B: AutodiffBackend,
    P: PinnProblem<B>,
{
    let mut history = LossHistory::default();
    let model = run_adam(problem, model, config, &mut history)?;
    let model = run_lbfgs(problem, model, config, &mut history)?;
    Ok((model, history))
}

fn run_adam<B, P>(
    problem: &P,
    mut model: P::Model,
    config: &TrainingConfig,
    history: &mut LossHistory,
) -> Result<P::Model>
where
    B: AutodiffBackend,
    P: PinnProblem<B>,
{
    let log_every = config.log_every.max(1);
    let mut optim = AdamConfig::new().init::<B, P::Model>();
    let start = Instant::now();
    info!(
        "Adam (学習率 {}) で {} 反復の学習を開始します",
        config.learning_rate, config.adam_iterations
    );

    for step in 0..config.adam_iterations {
        let terms = problem.losses(&model);
        if step % log_every == 0 {
            let record = LossRecord::capture(Phase::Adam, step, &terms);
            ensure_finite(Phase::Adam, record.total)?;
            history.push(record);
        }
        let grads = total_loss(&terms).backward();
        let grads = GradientsParams::from_grads(grads, &model);
        model = optim.step(config.learning_rate, model, grads);
    }

    let terms = problem.losses(&model);
    let record = LossRecord::capture(Phase::Adam, config.adam_iterations, &terms);
    ensure_finite(Phase::Adam, record.total)?;
    history.push(record);
    info!("=> Adam フェーズ完了: {:.2?}", start.elapsed());
    Ok(model)
}

/// モデルのパラメータを1本のベクタとして見た目的関数。
struct FlatObjective<'a, B, P>
where
    B: AutodiffBackend,
    P: PinnProblem<B>,
{
    problem: &'a P,
    model: &'a P::Model,
    backend: PhantomData<B>,
}

impl<B, P> FlatObjective<'_, B, P>
where
    B: AutodiffBackend,
    P: PinnProblem<B>,
{
    fn total(&self, values: &[f64]) -> (P::Model, Tensor<B, 1>) {
        let candidate = self.model.with_flat_values(values);
        let total = total_loss(&self.problem.losses(&candidate));
        (candidate, total)
    }
}

impl<B, P> CostFunction for FlatObjective<'_, B, P>
where
    B: AutodiffBackend,
    P: PinnProblem<B>,
{
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, values: &Vec<f64>) -> std::result::Result<f64, ArgminError> {
        let (_, total) = self.total(values);
        Ok(total.into_scalar().elem::<f64>())
    }
}

impl<B, P> Gradient for FlatObjective<'_, B, P>
where
    B: AutodiffBackend,
    P: PinnProblem<B>,
{
    type Param = Vec<f64>;
    type Gradient = Vec<f64>;

    fn gradient(&self, values: &Vec<f64>) -> std::result::Result<Vec<f64>, ArgminError> {
        let (candidate, total) = self.total(values);
        let grads = total.backward();
        candidate
            .flat_gradients(&grads)
            .map_err(|e| ArgminError::msg(e.to_string()))
    }
}

fn run_lbfgs<B, P>(
    problem: &P,
    model: P::Model,
    config: &TrainingConfig,
    history: &mut LossHistory,
) -> Result<P::Model>
where
    B: AutodiffBackend,
    P: PinnProblem<B>,
{
    if config.lbfgs.max_iterations == 0 {
        return Ok(model);
    }
    let offset = config.adam_iterations;
    let start = Instant::now();
    info!(
        "L-BFGS に切り替えます (最大 {} 反復, 履歴 {})",
        config.lbfgs.max_iterations, config.lbfgs.history_size
    );

    let objective = FlatObjective {
        problem,
        model: &model,
        backend: PhantomData,
    };
    let report = lbfgs::minimize(
        objective,
        model.flat_values()?,
        &config.lbfgs,
        config.log_every,
    )?;
    for &(iteration, loss) in &report.trace {
        history.push(LossRecord {
            phase: Phase::Lbfgs,
            step: offset + iteration,
            total: loss,
            terms: Vec::new(),
        });
    }

    let model = model.with_flat_values(&report.values);
    let record = LossRecord::capture(
        Phase::Lbfgs,
        offset + report.iterations,
        &problem.losses(&model),
    );
    ensure_finite(Phase::Lbfgs, record.total)?;
    history.push(record);
    info!(
        "=> L-BFGS フェーズ完了: {} 反復, 評価 {} 回, 終了理由: {}, {:.2?}",
        report.iterations,
        report.evaluations,
        report.termination,
        start.elapsed()
    );
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LbfgsConfig;
    use crate::geometry::{column_to_tensor, points_to_tensor};
    use crate::model::{Model, ModelConfig};
    use burn::backend::{Autodiff, NdArray};
    use burn::nn::loss::{MseLoss, Reduction};

    type TestBackend = Autodiff<NdArray<f64>>;

    /// 点列上で与えられた値に当てはめるだけの問題。
    struct FitProblem<B: Backend> {
        coords: Tensor<B, 2>,
        targets: Tensor<B, 2>,
    }

    impl<B: Backend> FitProblem<B> {
        fn new(target: impl Fn(f64, f64) -> f64, device: &B::Device) -> Self {
            let points: Vec<[f64; 2]> = (0..40)
                .map(|i| {
                    let x = -1.0 + 2.0 * (i % 10) as f64 / 9.0;
                    let t = (i / 10) as f64 / 3.0;
                    [x, t]
                })
                .collect();
            let values: Vec<f64> = points.iter().map(|&[x, t]| target(x, t)).collect();
            Self {
                coords: points_to_tensor(&points, device),
                targets: column_to_tensor(&values, device),
            }
        }
    }

    impl<B: AutodiffBackend> PinnProblem<B> for FitProblem<B> {
        type Model = Model<B>;

        fn losses(&self, model: &Model<B>) -> Vec<LossTerm<B>> {
            let pred = model.forward(self.coords.clone());
            let loss = MseLoss::new().forward(pred, self.targets.clone(), Reduction::Mean);
            vec![LossTerm::new("data", loss)]
        }
    }

    fn small_model(device: &<TestBackend as Backend>::Device) -> Model<TestBackend> {
        ModelConfig::new()
            .with_hidden_layers(2)
            .with_hidden_size(8)
            .init(device)
    }

    fn short_schedule(adam: usize, lbfgs: usize) -> TrainingConfig {
        TrainingConfig::new(LbfgsConfig::new().with_max_iterations(lbfgs))
            .with_adam_iterations(adam)
            .with_learning_rate(1e-2)
            .with_log_every(10)
    }

    #[test_log::test]
    fn both_phases_reduce_loss() {
        let device = Default::default();
        let problem = FitProblem::new(|x, t| (x * 2.0).sin() * (1.0 - t), &device);
        let config = short_schedule(100, 50);
        let (_, history) =
            train::<TestBackend, _>(&problem, small_model(&device), &config).unwrap();

        let records = history.records();
        let first = &records[0];
        let adam_end = records
            .iter()
            .rev()
            .find(|r| r.phase == Phase::Adam)
            .unwrap();
        let last = history.last().unwrap();

        assert_eq!(first.step, 0);
        assert_eq!(adam_end.step, 100);
        assert_eq!(last.phase, Phase::Lbfgs);
        assert!(adam_end.total < first.total);
        assert!(last.total <= adam_end.total);
        assert!(last.term("data").is_some());
    }

    #[test]
    fn skipping_lbfgs_leaves_only_adam_records() {
        let device = Default::default();
        let problem = FitProblem::new(|x, _| x, &device);
        let (_, history) =
            train::<TestBackend, _>(&problem, small_model(&device), &short_schedule(20, 0))
                .unwrap();
        assert!(history.records().iter().all(|r| r.phase == Phase::Adam));
        assert_eq!(history.records().len(), 3);
    }

    #[test]
    fn non_finite_loss_stops_training() {
        let device = Default::default();
        let problem = FitProblem::new(|_, _| f64::NAN, &device);
        let err = train::<TestBackend, _>(&problem, small_model(&device), &short_schedule(20, 10))
            .unwrap_err();
        assert!(matches!(err, PinnError::NonFiniteLoss { phase: "Adam", .. }));
    }

    #[test]
    fn total_loss_applies_weights() {
        let device = Default::default();
        let scalar = |v: f64| Tensor::<NdArray<f64>, 1>::from_floats([v], &device);
        let terms = vec![
            LossTerm::new("pde", scalar(0.5)),
            LossTerm::weighted("data", 100.0, scalar(0.02)),
        ];
        let total = total_loss(&terms).into_scalar();
        assert!((total - 2.5).abs() < 1e-6);
    }
}
