//! # バーガース方程式 PINN
//!
//! `clap` クレートを利用して、コマンドラインから順問題・逆問題・その連続実行・
//! 保存済みモデルからの書き出しを個別に実行できます。
//!
//! ## 使い方
//!
//! ```bash
//! cargo run --release -- forward
//! cargo run --release -- inverse --config inverse.json
//! cargo run --release -- pipeline --out-dir results
//! cargo run --release -- export
//! ```
//!
//! ログの詳細度は `RUST_LOG` で変更できます（既定は `info`）。

use burgers_pinn::cli::{Cli, Commands};
use burgers_pinn::config::{ForwardConfig, InverseConfig, load_or};
use burgers_pinn::data::SolutionTable;
use burgers_pinn::error::{PinnError, Result};
use burgers_pinn::{Artifacts, InferenceBackend, TrainingBackend, forward, inference, inverse};
use clap::Parser;
use log::info;
use std::path::Path;

fn run_forward(config: Option<&Path>, artifacts: &Artifacts) -> Result<SolutionTable> {
    let config = load_or(config, ForwardConfig::standard)?;
    let device = Default::default();
    let outcome = forward::run_forward::<TrainingBackend>(&config, &device)?;
    forward::persist(&outcome, &config, artifacts)?;
    Ok(outcome.table)
}

fn run_inverse(
    config: Option<&Path>,
    observations: &SolutionTable,
    artifacts: &Artifacts,
) -> Result<()> {
    let config = load_or(config, InverseConfig::standard)?;
    let device = Default::default();
    let outcome = inverse::run_inverse::<TrainingBackend>(&config, observations, &device)?;
    outcome.print_report(config.tolerance);
    inverse::persist(&outcome, observations, &config, artifacts);
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    std::fs::create_dir_all(&cli.out_dir).map_err(|source| PinnError::Io {
        path: cli.out_dir.clone(),
        source,
    })?;
    let artifacts = Artifacts::in_dir(&cli.out_dir);

    match &cli.command {
        Commands::Forward { config } => {
            run_forward(config.as_deref(), &artifacts)?;
        }
        Commands::Inverse { config } => {
            let observations = SolutionTable::read(&artifacts.solution)?;
            info!(
                "観測データを '{}' から読み込みました ({} 点)",
                artifacts.solution.display(),
                observations.len()
            );
            run_inverse(config.as_deref(), &observations, &artifacts)?;
        }
        Commands::Pipeline {
            forward_config,
            inverse_config,
        } => {
            let observations = run_forward(forward_config.as_deref(), &artifacts)?;
            run_inverse(inverse_config.as_deref(), &observations, &artifacts)?;
        }
        Commands::Export { config } => {
            let config = load_or(config.as_deref(), ForwardConfig::standard)?;
            let device = Default::default();
            let table = inference::export_saved_model::<InferenceBackend>(
                &config,
                &artifacts.model,
                &device,
            )?;
            table.write(&artifacts.solution)?;
            info!("=> 解データを '{}' に保存しました。", artifacts.solution.display());
        }
    }
    Ok(())
}

/// プログラムのエントリーポイント。
fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    run(Cli::parse())?;
    Ok(())
}
