mod commands;
mod utils;

use clap::{Parser, Subcommand, ValueEnum};
use lampstack_config::OutputFormat;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "lamp")]
#[command(
    about = "KDLで書いたLAMPスタックをCloudFormationテンプレートに変換",
    long_about = None
)]
struct Cli {
    /// デバッグログを標準エラーに出力
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// テンプレートの出力形式
#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Json,
    Yaml,
}

impl From<FormatArg> for OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Json => OutputFormat::Json,
            FormatArg::Yaml => OutputFormat::Yaml,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// CloudFormationテンプレートを生成
    Synth {
        /// ステージ名 (dev, stg, prod)
        stage: Option<String>,
        /// ステージ名 (-s/--stage フラグ、LAMP_STAGE 環境変数)
        #[arg(
            short = 's',
            long = "stage",
            env = "LAMP_STAGE",
            conflicts_with = "stage",
            hide = true
        )]
        stage_flag: Option<String>,
        /// 出力先ファイル（省略時は標準出力）
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// 出力形式（省略時はユーザー設定の output_format）
        #[arg(short, long, value_enum)]
        format: Option<FormatArg>,
        /// stack.kdl を使わず組み込みのLAMP構成から生成
        #[arg(long)]
        builtin: bool,
    },
    /// スタック定義を検証
    Validate {
        /// ステージ名 (dev, stg, prod)
        stage: Option<String>,
        /// ステージ名 (-s/--stage フラグ、LAMP_STAGE 環境変数)
        #[arg(
            short = 's',
            long = "stage",
            env = "LAMP_STAGE",
            conflicts_with = "stage",
            hide = true
        )]
        stage_flag: Option<String>,
        /// stack.kdl を使わず組み込みのLAMP構成を検証
        #[arg(long)]
        builtin: bool,
    },
    /// リソースの作成順序を表示
    Graph {
        /// ステージ名 (dev, stg, prod)
        stage: Option<String>,
        /// ステージ名 (-s/--stage フラグ、LAMP_STAGE 環境変数)
        #[arg(
            short = 's',
            long = "stage",
            env = "LAMP_STAGE",
            conflicts_with = "stage",
            hide = true
        )]
        stage_flag: Option<String>,
        /// 並列に作成できるグループ単位で表示
        #[arg(short, long)]
        waves: bool,
        /// stack.kdl を使わず組み込みのLAMP構成を表示
        #[arg(long)]
        builtin: bool,
    },
    /// 組み込みのLAMP構成で stack.kdl を作成
    Init {
        /// 作成先ディレクトリ
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,
        /// スタック名
        #[arg(short, long)]
        name: Option<String>,
        /// 既存の stack.kdl を上書き
        #[arg(short, long)]
        force: bool,
    },
    /// バージョン情報を表示
    Version,
}

fn init_tracing(verbose: bool) {
    // stdout はテンプレート出力に使うので、ログは stderr
    let filter = if verbose {
        EnvFilter::from_default_env().add_directive(tracing::Level::DEBUG.into())
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Versionコマンドは設定ファイル不要
    if matches!(cli.command, Commands::Version) {
        println!("lampstack {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let config = lampstack_config::load_user_config()?;

    match cli.command {
        Commands::Synth {
            stage,
            stage_flag,
            output,
            format,
            builtin,
        } => {
            let stage = utils::determine_stage(stage.or(stage_flag), &config);
            let loaded = utils::load_stack(stage.as_deref(), builtin, &config)?;
            let format = format.map_or(config.output_format, OutputFormat::from);
            commands::synth::handle(&loaded, output.as_deref(), format)?;
        }
        Commands::Validate {
            stage,
            stage_flag,
            builtin,
        } => {
            let stage = utils::determine_stage(stage.or(stage_flag), &config);
            let loaded = utils::load_stack(stage.as_deref(), builtin, &config)?;
            commands::validate::handle(&loaded)?;
        }
        Commands::Graph {
            stage,
            stage_flag,
            waves,
            builtin,
        } => {
            let stage = utils::determine_stage(stage.or(stage_flag), &config);
            let loaded = utils::load_stack(stage.as_deref(), builtin, &config)?;
            commands::graph::handle(&loaded.stack, waves)?;
        }
        Commands::Init { dir, name, force } => {
            commands::init::handle(&dir, name, force, &config)?;
        }
        Commands::Version => {
            unreachable!("Version is handled before config loading");
        }
    }

    Ok(())
}
