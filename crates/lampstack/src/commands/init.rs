use colored::Colorize;
use lampstack_config::UserConfig;
use lampstack_core::LampOptions;
use std::path::Path;

const STACK_FILE: &str = "stack.kdl";

/// 組み込みのLAMP構成を stack.kdl として書き出す
pub fn handle(dir: &Path, name: Option<String>, force: bool, config: &UserConfig) -> anyhow::Result<()> {
    let path = dir.join(STACK_FILE);
    if path.exists() && !force {
        anyhow::bail!(
            "{} は既に存在します（上書きする場合は --force を指定してください）",
            path.display()
        );
    }

    let defaults = LampOptions::default();
    let opts = LampOptions {
        stack_name: name.unwrap_or(defaults.stack_name.clone()),
        region: config.region.clone(),
        ..defaults
    };
    let content = lampstack_core::render_kdl(&opts)?;

    std::fs::create_dir_all(dir)?;
    std::fs::write(&path, content)?;

    println!("{}", "✓ stack.kdl を作成しました！".green());
    println!("  {}", path.display().to_string().cyan());
    println!();
    println!("{}", "次のコマンドでテンプレートを生成できます:".bold());
    println!("  {} synth", "lamp".cyan());
    Ok(())
}
