use clap::{ArgGroup, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "artifact-renamer", version)]
#[command(about = "遺物ラベル写真から遺跡番号・遺物番号を読み取りリネームするツール", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 詳細ログを出力
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// tesseract 実行ファイル（省略時は TESSERACT_CMD・設定ファイル・PATH の順）
    #[arg(long, global = true)]
    pub tesseract_cmd: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 写真1枚から識別子を検出して表示
    Detect {
        /// 写真ファイル
        #[arg(required = true)]
        image: PathBuf,

        /// OCRの生テキストも表示
        #[arg(long)]
        show_text: bool,
    },

    /// 検出結果に従って写真をリネーム
    #[command(group(ArgGroup::new("input").required(true).args(["image", "directory"])))]
    Rename {
        /// 写真ファイル（1枚）
        image: Option<PathBuf>,

        /// 写真フォルダ（一括）
        #[arg(short, long)]
        directory: Option<PathBuf>,

        /// 出力フォルダ（指定時はコピー、省略時はその場でリネーム）
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// 対象ファイルのglob（デフォルト: 設定の file_pattern）
        #[arg(short, long)]
        pattern: Option<String>,

        /// 変更せずに結果だけ表示
        #[arg(long)]
        dry_run: bool,

        /// 既存ファイルを上書き
        #[arg(long)]
        overwrite: bool,

        /// 上書き前のバックアップを作らない
        #[arg(long)]
        no_backup: bool,

        /// サブフォルダを走査しない
        #[arg(long)]
        no_recursive: bool,

        /// その場リネームの確認を省略
        #[arg(short, long)]
        force: bool,

        /// 一括処理ログ（JSON）を書き出さない
        #[arg(long)]
        no_log: bool,
    },

    /// フォルダ内の写真のリネーム結果を一覧表示（変更なし）
    Preview {
        /// 写真フォルダ
        #[arg(required = true)]
        directory: PathBuf,

        /// 対象ファイルのglob
        #[arg(short, long)]
        pattern: Option<String>,

        /// サブフォルダを走査しない
        #[arg(long)]
        no_recursive: bool,
    },

    /// Webアップロード画面を起動
    Serve {
        /// ポート（デフォルト: 設定の web_port）
        #[arg(short, long)]
        port: Option<u16>,

        /// 待ち受けアドレス
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },

    /// 設定を表示/編集
    Config {
        /// tesseract 実行ファイルを設定
        #[arg(long)]
        set_tesseract_cmd: Option<String>,

        /// OCR言語を設定（例: eng）
        #[arg(long)]
        set_language: Option<String>,

        /// 並列ワーカー数を設定
        #[arg(long)]
        set_workers: Option<usize>,

        /// 設定を表示
        #[arg(long)]
        show: bool,
    },
}
