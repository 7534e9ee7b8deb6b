//! PINNの学習・データ受け渡しで発生するエラー型。

use std::path::PathBuf;
use thiserror::Error;

/// このクレートの`Result`型。
pub type Result<T> = std::result::Result<T, PinnError>;

/// 順問題・逆問題の実行中に発生しうるエラー。
///
/// どのエラーも実行全体にとって致命的で、呼び出し側での回復は想定していません。
#[derive(Debug, Error)]
pub enum PinnError {
    /// ファイルの読み書きに失敗した。
    #[error("ファイル '{path}' にアクセスできません: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 解データファイルの先頭行が `x t u` ではない。
    #[error("'{path}' のヘッダ行が不正です (期待値: \"x t u\", 実際: {found:?})")]
    MissingHeader { path: PathBuf, found: String },

    /// 列数が3でない、または数値として解釈できない行がある。
    #[error("'{path}' の {line} 行目が不正です: {content:?}")]
    MalformedRow {
        path: PathBuf,
        line: usize,
        content: String,
    },

    /// ヘッダのみでデータ行が存在しない。
    #[error("'{path}' にデータ行がありません")]
    EmptyTable { path: PathBuf },

    /// 逆問題に観測データが1点も与えられていない。
    #[error("観測データがありません")]
    NoObservations,

    /// 学習フェーズの損失が有限値でなくなった（発散・NaN）。
    #[error("{phase} フェーズの損失が有限値ではありません: {value}")]
    NonFiniteLoss { phase: &'static str, value: f64 },

    /// テンソルとホスト側ベクタの変換に失敗した。
    #[error("テンソルデータの変換に失敗しました: {0}")]
    Tensor(String),

    /// 学習済みモデルの保存・読み込みに失敗した。
    #[error("モデルレコードの保存・読み込みに失敗しました: {0}")]
    Record(#[from] burn::record::RecorderError),

    /// L-BFGSの設定が不正、または最適化が途中で失敗した。
    #[error("L-BFGS による最適化に失敗しました: {0}")]
    Optimizer(String),

    /// 設定ファイルを読み込めない。
    #[error("設定ファイルを読み込めません: {0}")]
    Config(String),
}

impl PinnError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
