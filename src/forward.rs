use crate::Artifacts;
use crate::config::ForwardConfig;
use crate::data::{SolutionRow, SolutionTable};
use crate::error::Result;
use crate::geometry::{CollocationSet, Domain, points_to_tensor};
use crate::model::{Model, tensor_to_vec};
use crate::pinn::{BurgersCoefficients, ForwardProblem, residual_mse};
use crate::plot;
use crate::training::{LossHistory, train};
use burn::module::{AutodiffModule, Module};
use burn::prelude::Backend;
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder};
use burn::tensor::backend::AutodiffBackend;
use log::{info, warn};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::path::Path;
use std::time::Instant;

/// 順問題の結果。
pub struct ForwardOutcome<B: AutodiffBackend> {
    pub model: Model<B>,
    /// 代表時刻 × 等間隔な空間格子上の予測値。
    pub table: SolutionTable,
    pub history: LossHistory,
    /// 学習に使っていない内部点でのPDE残差の二乗平均。
    pub test_residual: f64,
}

/// 順問題を解きます。
///
/// コロケーション点をサンプリングし、PDE残差・境界条件・初期条件の損失で
/// ネットワークを学習した後、代表時刻ごとの解を表にまとめます。
pub fn run_forward<B: AutodiffBackend>(
    config: &ForwardConfig,
    device: &B::Device,
) -> Result<ForwardOutcome<B>> {
    B::seed(config.training.seed);
    let mut rng = StdRng::seed_from_u64(config.training.seed);

    let equation = &config.equation;
    let domain = Domain::new(equation.length, equation.duration);
    let points = CollocationSet::sample(&domain, &config.sampling, &mut rng);
    let test_points = domain.sample_interior(config.sampling.num_test, &mut rng);
    info!(
        "コロケーション点: 内部 {}, 境界 {}, 初期 {}, 評価用 {}",
        points.domain.len(),
        points.boundary.len(),
        points.initial.len(),
        test_points.len()
    );

    let problem = ForwardProblem::new(equation, &points, device);
    let model = config.model.init::<B>(device);
    info!("学習を開始します (バーガース方程式, ν = {:.6})", equation.viscosity);
    let training_start = Instant::now();
    let (model, history) = train::<B, _>(&problem, model, &config.training)?;
    info!("=> 学習時間: {:.2?}", training_start.elapsed());

    let inference = model.valid();
    let coefficients = BurgersCoefficients::fixed(1.0, equation.viscosity, device);
    let test_residual = residual_mse(&inference, &test_points, &coefficients, device)?;
    info!("=> 評価用の点での残差 MSE: {:.6e}", test_residual);

    let table = predict_table(
        &inference,
        &domain,
        config.grid_points,
        config.time_steps,
        device,
    )?;

    Ok(ForwardOutcome {
        model,
        table,
        history,
        test_residual,
    })
}

/// 任意の点列での予測値。
pub fn predict<B: Backend>(
    model: &Model<B>,
    points: &[[f64; 2]],
    device: &B::Device,
) -> Result<Vec<f64>> {
    if points.is_empty() {
        return Ok(Vec::new());
    }
    tensor_to_vec(model.forward(points_to_tensor(points, device)))
}

/// 代表時刻 `time_steps` 個 × 空間格子 `grid_points` 点の予測を表にします。
///
/// 行は時刻ごとにまとまり、各時刻の中ではxの昇順に並びます。
pub fn predict_table<B: Backend>(
    model: &Model<B>,
    domain: &Domain,
    grid_points: usize,
    time_steps: usize,
    device: &B::Device,
) -> Result<SolutionTable> {
    let xs = domain.spatial_grid(grid_points);
    let points: Vec<[f64; 2]> = domain
        .time_steps(time_steps)
        .into_iter()
        .flat_map(|t| xs.iter().map(move |&x| [x, t]))
        .collect();
    let values = predict(model, &points, device)?;
    let rows = points
        .iter()
        .zip(values)
        .map(|(&[x, t], u)| SolutionRow { x, t, u })
        .collect();
    Ok(SolutionTable::from_rows(rows))
}

/// 学習済みモデルをファイルに保存します。
pub fn save_model<B: Backend>(model: Model<B>, path: &Path) -> Result<()> {
    model.save_file(path, &NamedMpkFileRecorder::<FullPrecisionSettings>::new())?;
    Ok(())
}

/// 順問題の成果物（解データ、解の図、損失グラフ、モデル）を書き出します。
///
/// 図は目視確認用のため、描画に失敗しても警告を出して処理を続けます。
pub fn persist<B: AutodiffBackend>(
    outcome: &ForwardOutcome<B>,
    config: &ForwardConfig,
    artifacts: &Artifacts,
) -> Result<()> {
    outcome.table.write(&artifacts.solution)?;
    info!("=> 解データを '{}' に保存しました。", artifacts.solution.display());

    let x_range = (-config.equation.length, config.equation.length);
    match plot::plot_solution_panels(&artifacts.solution_plot, &outcome.table, x_range) {
        Ok(()) => info!("=> 解のグラフを '{}' に保存しました。", artifacts.solution_plot.display()),
        Err(e) => warn!("解のグラフの描画に失敗しました: {}", e),
    }
    match plot::plot_loss_history(&artifacts.forward_loss, &outcome.history) {
        Ok(()) => info!("=> 損失グラフを '{}' に保存しました。", artifacts.forward_loss.display()),
        Err(e) => warn!("損失グラフの描画に失敗しました: {}", e),
    }

    save_model(outcome.model.valid(), &artifacts.model)?;
    info!("=> モデルを '{}' に保存しました。", artifacts.model.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EquationConfig, LbfgsConfig, SamplingConfig, TrainingConfig};
    use crate::model::ModelConfig;
    use burn::backend::{Autodiff, NdArray};

    type TestBackend = Autodiff<NdArray<f32>>;

    fn tiny_config() -> ForwardConfig {
        ForwardConfig::new(
            EquationConfig::new(),
            SamplingConfig::new()
                .with_num_domain(64)
                .with_num_boundary(8)
                .with_num_initial(16)
                .with_num_test(32),
            ModelConfig::new().with_hidden_layers(2).with_hidden_size(10),
            TrainingConfig::new(LbfgsConfig::new().with_max_iterations(5))
                .with_adam_iterations(10)
                .with_log_every(5),
        )
    }

    #[test]
    fn produces_canonical_table() {
        let device = Default::default();
        let outcome = run_forward::<TestBackend>(&tiny_config(), &device).unwrap();

        assert_eq!(outcome.table.len(), 500);
        let slices = outcome.table.time_slices();
        let times: Vec<f64> = slices.iter().map(|(t, _)| *t).collect();
        assert_eq!(times, vec![0.0, 0.25, 0.5, 0.75, 1.0]);
        assert!(slices.iter().all(|(_, points)| points.len() == 100));
        assert!(outcome.table.rows().iter().all(|row| row.u.is_finite()));
        assert!(outcome.test_residual.is_finite());
    }

    #[test]
    fn persist_writes_solution_and_model() {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = Artifacts::in_dir(dir.path());
        let config = tiny_config();
        let device = Default::default();
        let outcome = run_forward::<TestBackend>(&config, &device).unwrap();
        persist(&outcome, &config, &artifacts).unwrap();

        let text = std::fs::read_to_string(&artifacts.solution).unwrap();
        assert_eq!(text.lines().count(), 501);
        assert_eq!(text.lines().next(), Some("x t u"));
        assert!(artifacts.model.exists());
    }

    #[test]
    fn table_matches_model_predictions() {
        let device = Default::default();
        let model = ModelConfig::new()
            .with_hidden_layers(2)
            .with_hidden_size(4)
            .init::<NdArray<f32>>(&device);
        let domain = Domain::new(1.0, 1.0);
        let table = predict_table(&model, &domain, 3, 2, &device).unwrap();
        let expected = predict(&model, &table.inputs(), &device).unwrap();
        assert_eq!(table.outputs(), expected);
        assert_eq!(
            table.inputs(),
            vec![
                [-1.0, 0.0],
                [0.0, 0.0],
                [1.0, 0.0],
                [-1.0, 1.0],
                [0.0, 1.0],
                [1.0, 1.0]
            ]
        );
    }
}
