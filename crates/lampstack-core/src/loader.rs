//! 統合ローダー
//!
//! ファイル発見、テンプレート展開、パースを統合

use crate::discovery::{DiscoveredFiles, discover_files_with_stage};
use crate::error::{Result, StackError};
use crate::model::Stack;
use crate::parser::parse_kdl_string;
use crate::template::{TemplateProcessor, Variables, extract_variables};
use std::path::Path;
use tracing::{debug, info, instrument};

/// 指定されたルートディレクトリからプロジェクトをロード
pub fn load_project_from_root(project_root: &Path) -> Result<Stack> {
    load_project_from_root_with_stage(project_root, None)
}

/// ステージ指定でプロジェクトをロード
///
/// 読み込み順序: stack.kdl → resources/ → stack.{stage}.kdl → stack.local.kdl
/// 後から読み込んだファイルの同名リソースが前の宣言を置き換える。
#[instrument(skip(project_root), fields(project_root = %project_root.display()))]
pub fn load_project_from_root_with_stage(project_root: &Path, stage: Option<&str>) -> Result<Stack> {
    debug!("Step 1: Discovering files");
    let discovered = discover_files_with_stage(project_root, stage)?;
    if discovered.root.is_none() {
        return Err(StackError::ProjectRootNotFound(project_root.to_path_buf()));
    }

    debug!("Step 2: Preparing template processor");
    let mut processor = prepare_template_processor(&discovered, project_root, stage)?;

    debug!("Step 3: Expanding templates");
    let expanded = processor.render_files(&discovered.definition_files())?;
    info!(content_size = expanded.len(), "Template expansion complete");

    debug!("Step 4: Parsing KDL");
    let name = project_root
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unnamed")
        .to_string();
    let stack = parse_kdl_string(&expanded, name)?;
    info!(
        stack = %stack.name,
        resources = stack.logical_ids().len(),
        "Project loaded successfully"
    );

    Ok(stack)
}

fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| StackError::IoError {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// テンプレートプロセッサを準備
fn prepare_template_processor(
    discovered: &DiscoveredFiles,
    project_root: &Path,
    stage: Option<&str>,
) -> Result<TemplateProcessor> {
    let mut processor = TemplateProcessor::new();

    // ビルトイン変数
    processor.add_variable(
        "PROJECT_ROOT",
        serde_json::Value::String(project_root.to_string_lossy().to_string()),
    );
    processor.add_variable(
        "STAGE",
        stage.map_or(serde_json::Value::Null, |s| {
            serde_json::Value::String(s.to_string())
        }),
    );

    if let Some(env_file) = &discovered.env_file {
        processor.add_env_file_variables(env_file)?;
    }
    if let Some(stage_env_file) = &discovered.stage_env_file {
        processor.add_env_file_variables(stage_env_file)?;
    }

    processor.add_env_variables();

    // variables ブロック（最も優先度が高い）。後のファイルが前を上書き
    let mut all_variables = Variables::new();
    for var_file in &discovered.variables {
        all_variables.extend(extract_variables(&read_file(var_file)?)?);
    }
    for file in discovered.definition_files() {
        all_variables.extend(extract_variables(&read_file(file)?)?);
    }
    debug!(
        variable_count = all_variables.len(),
        "Adding collected variables to processor"
    );
    processor.add_variables(all_variables);

    Ok(processor)
}
