use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// clapでコマンドラインの構造を定義します。
#[derive(Parser, Debug)]
#[command(author, version, about = "Burgers' equation PINN with Burn", long_about = None)]
pub struct Cli {
    /// 成果物（解データ、図、モデル）を置くディレクトリ
    #[arg(long, global = true, default_value = ".")]
    pub out_dir: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

/// 実行するサブコマンド。
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// 順問題を解き、解データ・図・モデルを保存します
    Forward {
        /// 順問題の設定ファイル (JSON)。省略時は既定値
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// 解データファイルを観測データとして λ1, λ2 を推定します
    Inverse {
        /// 逆問題の設定ファイル (JSON)。省略時は既定値
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// 順問題と逆問題を続けて実行します
    Pipeline {
        #[arg(long)]
        forward_config: Option<PathBuf>,
        #[arg(long)]
        inverse_config: Option<PathBuf>,
    },
    /// 保存済みモデルから学習なしで解データを書き出します
    Export {
        #[arg(long)]
        config: Option<PathBuf>,
    },
}
