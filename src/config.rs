//! 学習・評価のハイパーパラメータ。
//!
//! すべて`burn`の`Config`として定義しており、JSONファイルとの相互変換ができます。
//! 既定値はバーガース方程式の標準的な設定（L = T = 1, ν = 0.01/π）です。

use crate::error::{PinnError, Result as PinnResult};
use crate::model::ModelConfig;
use burn::config::Config;
use std::path::Path;

/// 方程式と計算領域の物理定数。
#[derive(Config, Debug)]
pub struct EquationConfig {
    /// 空間領域の半幅 L（領域は [-L, L]）。
    #[config(default = 1.0)]
    pub length: f64,
    /// 時間領域の長さ T（領域は [0, T]）。
    #[config(default = 1.0)]
    pub duration: f64,
    /// 粘性係数 ν。
    #[config(default = "0.01 / std::f64::consts::PI")]
    pub viscosity: f64,
    /// 初期条件 -sin(nπx) の波数 n。
    #[config(default = 1.0)]
    pub wave_number: f64,
}

/// コロケーション点の個数。
#[derive(Config, Debug)]
pub struct SamplingConfig {
    #[config(default = 2540)]
    pub num_domain: usize,
    #[config(default = 80)]
    pub num_boundary: usize,
    #[config(default = 160)]
    pub num_initial: usize,
    /// 学習に使わない評価用の内部点。
    #[config(default = 10000)]
    pub num_test: usize,
}

/// L-BFGS（`argmin`）の収束判定と履歴長。
#[derive(Config, Debug)]
pub struct LbfgsConfig {
    #[config(default = 15000)]
    pub max_iterations: usize,
    /// 保持する曲率ペア (s, y) の数。
    #[config(default = 100)]
    pub history_size: usize,
    /// 勾配のノルムがこれを下回ったら収束。
    #[config(default = 1e-8)]
    pub gradient_tolerance: f64,
    /// 1反復あたりの損失の変化がこれ以下なら収束。
    #[config(default = 1e-12)]
    pub function_tolerance: f64,
}

/// Adam → L-BFGS の2段階スケジュール。
#[derive(Config, Debug)]
pub struct TrainingConfig {
    pub lbfgs: LbfgsConfig,
    #[config(default = 40000)]
    pub adam_iterations: usize,
    #[config(default = 1e-3)]
    pub learning_rate: f64,
    /// 損失を記録・表示する間隔（反復数）。
    #[config(default = 1000)]
    pub log_every: usize,
    /// 重み初期化とサンプリングの両方に使う乱数シード。
    #[config(default = 42)]
    pub seed: u64,
}

/// 順問題の設定一式。
#[derive(Config, Debug)]
pub struct ForwardConfig {
    pub equation: EquationConfig,
    pub sampling: SamplingConfig,
    pub model: ModelConfig,
    pub training: TrainingConfig,
    /// 出力表の空間方向の点数。
    #[config(default = 100)]
    pub grid_points: usize,
    /// 出力表の時刻数（0 から T までの等間隔）。
    #[config(default = 5)]
    pub time_steps: usize,
}

/// 逆問題の設定一式。
#[derive(Config, Debug)]
pub struct InverseConfig {
    pub equation: EquationConfig,
    pub model: ModelConfig,
    pub training: TrainingConfig,
    #[config(default = 2540)]
    pub num_domain: usize,
    /// 観測データ損失の重み（残差損失の重みは1）。
    #[config(default = 100.0)]
    pub observation_weight: f64,
    #[config(default = 1.0)]
    pub lambda_1_init: f64,
    #[config(default = "0.01 / std::f64::consts::PI")]
    pub lambda_2_init: f64,
    #[config(default = 1.0)]
    pub lambda_1_target: f64,
    #[config(default = "0.01 / std::f64::consts::PI")]
    pub lambda_2_target: f64,
    /// 推定係数が目標値から許容される絶対誤差。
    #[config(default = 0.05)]
    pub tolerance: f64,
}

impl TrainingConfig {
    /// 既定のスケジュール（Adam 40000 反復 + L-BFGS）。
    pub fn standard() -> Self {
        Self::new(LbfgsConfig::new())
    }
}

impl ForwardConfig {
    /// 既定値による順問題の設定。
    pub fn standard() -> Self {
        Self::new(
            EquationConfig::new(),
            SamplingConfig::new(),
            ModelConfig::new(),
            TrainingConfig::standard(),
        )
    }
}

impl InverseConfig {
    /// 既定値による逆問題の設定。
    pub fn standard() -> Self {
        Self::new(EquationConfig::new(), ModelConfig::new(), TrainingConfig::standard())
    }
}

/// JSONファイルが指定されていれば読み込み、なければ`default`を返します。
pub fn load_or<C: Config>(path: Option<&Path>, default: impl FnOnce() -> C) -> PinnResult<C> {
    match path {
        Some(path) => C::load(path)
            .map_err(|e| PinnError::Config(format!("{}: {:?}", path.display(), e))),
        None => Ok(default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_burgers_setup() {
        let config = ForwardConfig::standard();
        assert_eq!(config.equation.length, 1.0);
        assert_eq!(config.equation.duration, 1.0);
        assert!((config.equation.viscosity - 0.01 / std::f64::consts::PI).abs() < 1e-15);
        assert_eq!(config.sampling.num_domain, 2540);
        assert_eq!(config.sampling.num_boundary, 80);
        assert_eq!(config.sampling.num_initial, 160);
        assert_eq!(config.sampling.num_test, 10000);
        assert_eq!(config.model.hidden_layers, 7);
        assert_eq!(config.model.hidden_size, 50);
        assert_eq!(config.training.adam_iterations, 40000);
        assert_eq!(config.grid_points * config.time_steps, 500);
    }

    #[test]
    fn inverse_starts_at_targets() {
        let config = InverseConfig::standard();
        assert_eq!(config.observation_weight, 100.0);
        assert_eq!(config.lambda_1_init, config.lambda_1_target);
        assert_eq!(config.lambda_2_init, config.lambda_2_target);
    }

    #[test]
    fn json_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("forward.json");
        let config = ForwardConfig::standard().with_grid_points(20);
        config.save(&path).unwrap();

        let loaded: ForwardConfig = load_or(Some(&path), ForwardConfig::standard).unwrap();
        assert_eq!(loaded.grid_points, 20);
        assert_eq!(loaded.model.hidden_size, config.model.hidden_size);
    }

    #[test]
    fn missing_config_file_is_reported() {
        let err = load_or(Some(Path::new("no/such/config.json")), ForwardConfig::standard)
            .unwrap_err();
        assert!(matches!(err, PinnError::Config(msg) if msg.contains("no/such/config.json")));
    }
}
