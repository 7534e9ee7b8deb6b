use crate::config::ForwardConfig;
use crate::data::SolutionTable;
use crate::error::{PinnError, Result};
use crate::forward::predict_table;
use crate::geometry::Domain;
use burn::module::Module;
use burn::prelude::Backend;
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder};
use log::info;
use std::io;
use std::path::Path;
use std::time::Instant;

/// 保存済みの順問題モデルを読み込み、学習せずに解の表を作り直します。
///
/// ネットワークの形は `config.model` と一致している必要があります。
pub fn export_saved_model<B: Backend>(
    config: &ForwardConfig,
    model_path: &Path,
    device: &B::Device,
) -> Result<SolutionTable> {
    if !model_path.exists() {
        return Err(PinnError::io(
            model_path,
            io::Error::new(
                io::ErrorKind::NotFound,
                "モデルファイルが見つかりません。最初に 'forward' コマンドで学習・保存してください",
            ),
        ));
    }

    let start = Instant::now();
    info!("保存済みモデルを '{}' からロード中...", model_path.display());
    let model = config.model.init::<B>(device).load_file(
        model_path,
        &NamedMpkFileRecorder::<FullPrecisionSettings>::new(),
        device,
    )?;

    let domain = Domain::new(config.equation.length, config.equation.duration);
    let table = predict_table(
        &model,
        &domain,
        config.grid_points,
        config.time_steps,
        device,
    )?;
    info!("=> 推論時間: {:.2?} ({} 点)", start.elapsed(), table.len());
    Ok(table)
}
