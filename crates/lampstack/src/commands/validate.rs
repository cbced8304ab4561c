use crate::utils::{self, LoadedStack};
use colored::Colorize;
use lampstack_cloud::{CloudError, Template};
use lampstack_core::StackError;

pub fn handle(loaded: &LoadedStack) -> anyhow::Result<()> {
    println!("{}", "スタック定義を検証中...".blue());
    utils::print_source(loaded);

    let template = match lampstack_cloud::synthesize(&loaded.stack) {
        Ok(template) => template,
        Err(CloudError::Stack(StackError::Invalid(issues))) => {
            eprintln!();
            eprintln!(
                "{}",
                format!("✗ スタック定義に {} 件の問題があります", issues.len())
                    .red()
                    .bold()
            );
            for issue in &issues {
                eprintln!("  - {}", issue);
            }
            std::process::exit(1);
        }
        Err(e) => return Err(e.into()),
    };

    let violations = lampstack_cloud::verify(&template);
    if !violations.is_empty() {
        eprintln!();
        eprintln!("{}", "✗ 生成したテンプレートが検査に失敗しました".red().bold());
        for violation in &violations {
            eprintln!("  - {}", violation);
        }
        std::process::exit(1);
    }

    println!("{}", "✓ スタック定義は正常です！".green().bold());
    println!();
    print_summary(&loaded.stack.name, &template);
    Ok(())
}

fn print_summary(name: &str, template: &Template) {
    let summary = template.summary();
    println!("サマリー: {} ({})", name.cyan(), summary);

    println!("  リソース:");
    for (resource_type, count) in &summary.by_type {
        println!("    - {} ×{}", resource_type, count);
    }

    if !template.parameters.is_empty() {
        println!("  パラメータ（既存リソース）:");
        for (id, parameter) in &template.parameters {
            let default = parameter
                .default
                .as_ref()
                .and_then(|v| v.as_str())
                .unwrap_or("(デプロイ時に指定)");
            println!("    - {} = {}", id.cyan(), default);
        }
    }

    if !template.outputs.is_empty() {
        println!("  出力:");
        for id in template.outputs.keys() {
            println!("    - {}", id.cyan());
        }
    }
}
