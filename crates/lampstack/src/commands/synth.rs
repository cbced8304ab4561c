use crate::utils::{self, LoadedStack};
use colored::Colorize;
use lampstack_config::OutputFormat;
use std::path::Path;
use tracing::info;

/// テンプレートを生成して標準出力またはファイルに書き出す
///
/// 標準出力にはテンプレートのみを書き、進捗は標準エラーに出す。
pub fn handle(loaded: &LoadedStack, output: Option<&Path>, format: OutputFormat) -> anyhow::Result<()> {
    let template = lampstack_cloud::synthesize(&loaded.stack)?;

    let violations = lampstack_cloud::verify(&template);
    if !violations.is_empty() {
        let details = violations
            .iter()
            .map(|v| format!("  - {}", v))
            .collect::<Vec<_>>()
            .join("\n");
        anyhow::bail!("生成したテンプレートが検査に失敗しました:\n{}", details);
    }

    let mut rendered = match format {
        OutputFormat::Json => template.to_json_pretty()?,
        OutputFormat::Yaml => template.to_yaml()?,
    };
    if !rendered.ends_with('\n') {
        rendered.push('\n');
    }

    match output {
        Some(path) => {
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
            {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, &rendered)?;
            info!(path = %path.display(), format = format.as_str(), "Template written");

            utils::print_source(loaded);
            eprintln!(
                "{} {} ({})",
                "✓ テンプレートを書き出しました:".green().bold(),
                path.display().to_string().cyan(),
                template.summary()
            );
        }
        None => print!("{}", rendered),
    }

    Ok(())
}
