use anyhow::Context;
use colored::Colorize;
use lampstack_config::UserConfig;
use lampstack_core::{LampOptions, Stack, StackError};
use std::path::{Path, PathBuf};
use tracing::debug;

/// スタック定義の読み込み元
pub enum StackSource {
    /// 組み込みのLAMP構成
    Builtin,
    /// プロジェクトルート
    Project(PathBuf),
}

pub struct LoadedStack {
    pub stack: Stack,
    pub source: StackSource,
    pub stage: Option<String>,
}

/// ステージ名を決定する（引数 → LAMP_STAGE → ユーザー設定の default_stage）
pub fn determine_stage(stage: Option<String>, config: &UserConfig) -> Option<String> {
    stage.or_else(|| config.default_stage.clone())
}

/// スタック定義を読み込む（共通ロジック）
pub fn load_stack(
    stage: Option<&str>,
    builtin: bool,
    config: &UserConfig,
) -> anyhow::Result<LoadedStack> {
    if builtin {
        let opts = LampOptions {
            region: config.region.clone(),
            ..Default::default()
        };
        return Ok(LoadedStack {
            stack: lampstack_core::lamp_stack(&opts),
            source: StackSource::Builtin,
            stage: stage.map(str::to_string),
        });
    }

    let project_root = match lampstack_core::find_project_root() {
        Ok(root) => root,
        Err(StackError::ProjectRootNotFound(start)) => {
            anyhow::bail!(
                "stack.kdl が見つかりません（探索開始位置: {}）\nヒント: `lamp init` で作成するか、--builtin で組み込み構成を使ってください",
                start.display()
            );
        }
        Err(e) => return Err(e.into()),
    };

    let mut stack =
        match lampstack_core::load_project_from_root_with_stage(&project_root, stage) {
            Ok(stack) => stack,
            Err(
                e @ (StackError::TemplateError { .. } | StackError::TemplateRenderError(_)),
            ) if stage.is_none() => {
                return Err(anyhow::Error::new(e).context(
                    "ステージが指定されていません。ステージ別の変数を使う場合は `lamp <command> <stage>` または LAMP_STAGE=<stage> で指定してください",
                ));
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("{} の読み込みに失敗しました", project_root.display()));
            }
        };

    if stack.environment.region.is_none() && config.region.is_some() {
        debug!(region = ?config.region, "Using region from user config");
        stack.environment.region = config.region.clone();
    }

    Ok(LoadedStack {
        stack,
        source: StackSource::Project(project_root),
        stage: stage.map(str::to_string),
    })
}

/// 読み込んだスタック定義の情報を表示
pub fn print_source(loaded: &LoadedStack) {
    match &loaded.source {
        StackSource::Builtin => {
            eprintln!("📄 組み込みのLAMP構成");
        }
        StackSource::Project(root) => {
            eprintln!(
                "📄 プロジェクトルート: {}",
                root.display().to_string().cyan()
            );
            print_definition_files(root, loaded.stage.as_deref());
        }
    }
    if let Some(stage) = &loaded.stage {
        eprintln!("   ステージ: {}", stage.cyan());
    }
}

fn print_definition_files(project_root: &Path, stage: Option<&str>) {
    let Ok(files) = lampstack_core::discover_files_with_stage(project_root, stage) else {
        return;
    };
    for file in files.definition_files() {
        let label = file.strip_prefix(project_root).unwrap_or(file);
        eprintln!("   • {}", label.display());
    }
}
