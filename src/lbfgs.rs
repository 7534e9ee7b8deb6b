//! `argmin` の L-BFGS をパラメータ全体の`f64`ベクタに対して実行します。
//!
//! ステップ幅は More-Thuente 直線探索で決めます。

use crate::config::LbfgsConfig;
use crate::error::{PinnError, Result};
use argmin::core::observers::{Observe, ObserverMode};
use argmin::core::{CostFunction, Error as ArgminError, Executor, Gradient, KV, State};
use argmin::solver::linesearch::MoreThuenteLineSearch;
use argmin::solver::quasinewton::LBFGS;
use std::sync::{Arc, Mutex};

/// 最適化の結果。
#[derive(Debug, Clone)]
pub struct LbfgsReport {
    /// 最良のパラメータ。
    pub values: Vec<f64>,
    pub loss: f64,
    pub iterations: usize,
    /// 目的関数の評価回数。
    pub evaluations: usize,
    /// 終了理由。
    pub termination: String,
    /// `log_every` 反復ごとの (反復数, 損失)。
    pub trace: Vec<(usize, f64)>,
}

/// 反復ごとの損失を記録するオブザーバ。
struct Trace(Arc<Mutex<Vec<(usize, f64)>>>);

impl<I: State<Float = f64>> Observe<I> for Trace {
    fn observe_iter(&mut self, state: &I, _kv: &KV) -> std::result::Result<(), ArgminError> {
        if let Ok(mut trace) = self.0.lock() {
            trace.push((state.get_iter() as usize, state.get_cost()));
        }
        Ok(())
    }
}

/// `objective` を `initial` から最小化します。
pub fn minimize<O>(
    objective: O,
    initial: Vec<f64>,
    config: &LbfgsConfig,
    log_every: usize,
) -> Result<LbfgsReport>
where
    O: CostFunction<Param = Vec<f64>, Output = f64>
        + Gradient<Param = Vec<f64>, Gradient = Vec<f64>>,
{
    let optimizer = |e: ArgminError| PinnError::Optimizer(e.to_string());
    let solver = LBFGS::new(MoreThuenteLineSearch::new(), config.history_size)
        .with_tolerance_grad(config.gradient_tolerance)
        .map_err(optimizer)?
        .with_tolerance_cost(config.function_tolerance)
        .map_err(optimizer)?;

    let trace = Arc::new(Mutex::new(Vec::new()));
    let fallback = initial.clone();
    let result = Executor::new(objective, solver)
        .configure(|state| state.param(initial).max_iters(config.max_iterations as u64))
        .add_observer(
            Trace(Arc::clone(&trace)),
            ObserverMode::Every(log_every.max(1) as u64),
        )
        .run()
        .map_err(optimizer)?;

    let state = result.state();
    let evaluations = state
        .get_func_counts()
        .get("cost_count")
        .copied()
        .unwrap_or(0);
    let trace = trace
        .lock()
        .map(|mut trace| std::mem::take(&mut *trace))
        .unwrap_or_default();
    Ok(LbfgsReport {
        values: state.get_best_param().cloned().unwrap_or(fallback),
        loss: state.get_best_cost(),
        iterations: state.get_iter() as usize,
        evaluations: evaluations as usize,
        termination: format!("{:?}", state.get_termination_status()),
        trace,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Rosenbrock;

    impl CostFunction for Rosenbrock {
        type Param = Vec<f64>;
        type Output = f64;

        fn cost(&self, p: &Vec<f64>) -> std::result::Result<f64, ArgminError> {
            let (x, y) = (p[0], p[1]);
            Ok((1.0 - x).powi(2) + 100.0 * (y - x * x).powi(2))
        }
    }

    impl Gradient for Rosenbrock {
        type Param = Vec<f64>;
        type Gradient = Vec<f64>;

        fn gradient(&self, p: &Vec<f64>) -> std::result::Result<Vec<f64>, ArgminError> {
            let (x, y) = (p[0], p[1]);
            Ok(vec![
                -2.0 * (1.0 - x) - 400.0 * x * (y - x * x),
                200.0 * (y - x * x),
            ])
        }
    }

    #[test]
    fn finds_rosenbrock_minimum() {
        let config = LbfgsConfig::new()
            .with_max_iterations(500)
            .with_history_size(10);
        let report = minimize(Rosenbrock, vec![-1.2, 1.0], &config, 1).unwrap();
        assert!((report.values[0] - 1.0).abs() < 1e-4, "{:?}", report.values);
        assert!((report.values[1] - 1.0).abs() < 1e-4, "{:?}", report.values);
        assert!(report.loss < 1e-8);
        assert!(report.evaluations >= report.iterations);
    }

    #[test]
    fn respects_iteration_limit() {
        let config = LbfgsConfig::new().with_max_iterations(3);
        let report = minimize(Rosenbrock, vec![-1.2, 1.0], &config, 1).unwrap();
        assert!(report.iterations <= 3);
        assert!(report.trace.len() <= 3);
        assert!(report.loss < 24.2);
    }

    #[test]
    fn trace_follows_log_interval() {
        let config = LbfgsConfig::new().with_max_iterations(20);
        let report = minimize(Rosenbrock, vec![-1.2, 1.0], &config, 5).unwrap();
        assert!(!report.trace.is_empty());
        assert!(report.trace.iter().all(|&(iteration, _)| iteration % 5 == 0));
    }
}
