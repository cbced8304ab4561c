//! ファイル自動発見機能
//!
//! 規約ベースのディレクトリ構造からスタック定義ファイルを発見します。
//!
//! ```text
//! stack.kdl               (または .lampstack/stack.kdl)
//! resources/**/*.kdl      分割したリソース定義
//! variables/**/*.kdl      variables ブロックのみのファイル
//! stack.{stage}.kdl       ステージ別の上書き
//! stack.local.kdl         手元での上書き
//! .env / .env.{stage}
//! ```

use crate::error::{Result, StackError};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// プロジェクトルートを指定する環境変数
pub const PROJECT_ROOT_ENV: &str = "LAMPSTACK_PROJECT_ROOT";

/// 発見されたファイル群
#[derive(Debug, Clone, Default)]
pub struct DiscoveredFiles {
    /// ルートファイル (stack.kdl)
    pub root: Option<PathBuf>,
    /// 分割されたリソース定義 (resources/**/*.kdl)
    pub resources: Vec<PathBuf>,
    /// 変数定義ファイル (variables/**/*.kdl)
    pub variables: Vec<PathBuf>,
    /// ステージ固有オーバーライドファイル (stack.{stage}.kdl)
    pub stage_override: Option<PathBuf>,
    /// ローカルオーバーライドファイル (stack.local.kdl)
    pub local_override: Option<PathBuf>,
    /// 環境変数ファイル (.env)
    pub env_file: Option<PathBuf>,
    /// ステージ固有の環境変数ファイル (.env.{stage})
    pub stage_env_file: Option<PathBuf>,
}

impl DiscoveredFiles {
    /// 連結してパースする順序で定義ファイルを返す
    pub fn definition_files(&self) -> Vec<&Path> {
        let mut files: Vec<&Path> = Vec::new();
        files.extend(self.root.as_deref());
        files.extend(self.resources.iter().map(PathBuf::as_path));
        files.extend(self.stage_override.as_deref());
        files.extend(self.local_override.as_deref());
        files
    }
}

fn has_root_file(dir: &Path) -> bool {
    dir.join("stack.kdl").exists() || dir.join(".lampstack/stack.kdl").exists()
}

/// プロジェクトルートを検出
///
/// 以下の優先順位で検索:
/// 1. 環境変数 LAMPSTACK_PROJECT_ROOT
/// 2. カレントディレクトリから上に向かって以下を探す:
///    - stack.kdl
///    - .lampstack/stack.kdl
#[tracing::instrument]
pub fn find_project_root() -> Result<PathBuf> {
    if let Ok(root) = std::env::var(PROJECT_ROOT_ENV) {
        let path = PathBuf::from(&root);
        debug!(env_root = %root, "Checking {}", PROJECT_ROOT_ENV);
        if has_root_file(&path) {
            info!(project_root = %path.display(), "Found project root from environment variable");
            return Ok(path);
        }
    }

    let start_dir = std::env::current_dir()?;
    find_project_root_from(&start_dir)
}

/// 指定ディレクトリから上に向かってプロジェクトルートを探す
pub fn find_project_root_from(start_dir: &Path) -> Result<PathBuf> {
    let mut current = start_dir.to_path_buf();
    debug!(start_dir = %start_dir.display(), "Searching for project root");

    loop {
        if has_root_file(&current) {
            info!(project_root = %current.display(), "Found project root");
            return Ok(current);
        }
        if !current.pop() {
            break;
        }
    }

    warn!(start_dir = %start_dir.display(), "Project root not found");
    Err(StackError::ProjectRootNotFound(start_dir.to_path_buf()))
}

/// プロジェクトルートからファイルを自動発見
pub fn discover_files(project_root: &Path) -> Result<DiscoveredFiles> {
    discover_files_with_stage(project_root, None)
}

/// 先に見つかった方を返す（ルート直下 → .lampstack/）
fn first_existing(project_root: &Path, name: &str) -> Option<PathBuf> {
    [
        project_root.join(name),
        project_root.join(".lampstack").join(name),
    ]
    .into_iter()
    .find(|p| p.exists())
}

/// ステージ指定でプロジェクトルートからファイルを自動発見
#[tracing::instrument(skip(project_root), fields(project_root = %project_root.display()))]
pub fn discover_files_with_stage(
    project_root: &Path,
    stage: Option<&str>,
) -> Result<DiscoveredFiles> {
    debug!("Starting file discovery");
    let mut discovered = DiscoveredFiles {
        root: first_existing(project_root, "stack.kdl"),
        local_override: first_existing(project_root, "stack.local.kdl"),
        env_file: first_existing(project_root, ".env"),
        ..Default::default()
    };

    let resources_dir = project_root.join("resources");
    if resources_dir.is_dir() {
        discovered.resources = discover_kdl_files(&resources_dir)?;
        info!(
            resource_count = discovered.resources.len(),
            "Discovered resource files"
        );
    }

    let variables_dir = project_root.join("variables");
    if variables_dir.is_dir() {
        discovered.variables = discover_kdl_files(&variables_dir)?;
        info!(
            variable_count = discovered.variables.len(),
            "Discovered variable files"
        );
    }

    if let Some(stage_name) = stage {
        discovered.stage_override =
            first_existing(project_root, &format!("stack.{}.kdl", stage_name));
        discovered.stage_env_file = first_existing(project_root, &format!(".env.{}", stage_name));
        if let Some(file) = &discovered.stage_override {
            debug!(file = %file.display(), stage = %stage_name, "Found stage override file");
        }
    }

    Ok(discovered)
}

/// ディレクトリ配下の .kdl ファイルを再帰的に発見
///
/// アルファベット順にソートして返す
fn discover_kdl_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut visited = HashSet::new();

    visit_dir(dir, &mut files, &mut visited)?;
    files.sort();

    Ok(files)
}

fn visit_dir(dir: &Path, files: &mut Vec<PathBuf>, visited: &mut HashSet<PathBuf>) -> Result<()> {
    let io_error = |message: String| StackError::IoError {
        path: dir.to_path_buf(),
        message,
    };

    let canonical_dir = dir
        .canonicalize()
        .map_err(|e| io_error(format!("パスの正規化に失敗: {}", e)))?;

    // シンボリックリンクのループ
    if !visited.insert(canonical_dir.clone()) {
        warn!(dir = %canonical_dir.display(), "Symlink loop detected, skipping");
        return Ok(());
    }

    let entries =
        std::fs::read_dir(dir).map_err(|e| io_error(format!("ディレクトリの読み込みに失敗: {}", e)))?;

    for entry in entries {
        let path = entry
            .map_err(|e| io_error(format!("ディレクトリエントリの読み込みに失敗: {}", e)))?
            .path();

        if path.is_dir() {
            visit_dir(&path, files, visited)?;
        } else if path.extension().and_then(|s| s.to_str()) == Some("kdl") {
            files.push(path);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;

    fn create_test_project(base: &Path) -> Result<()> {
        fs::write(base.join("stack.kdl"), "// root")?;

        fs::create_dir_all(base.join("resources/dns"))?;
        fs::write(base.join("resources/network.kdl"), "network {}")?;
        fs::write(base.join("resources/alb.kdl"), "load-balancer \"LampALB\" {}")?;
        fs::write(base.join("resources/dns/zone.kdl"), "hosted-zone \"Z\"")?;
        fs::write(base.join("resources/README.md"), "not a kdl file")?;

        fs::create_dir_all(base.join("variables"))?;
        fs::write(base.join("variables/common.kdl"), "variables {}")?;

        fs::write(base.join("stack.prod.kdl"), "// prod override")?;
        fs::write(base.join("stack.local.kdl"), "// local override")?;
        fs::write(base.join(".env"), "LAMP_REGION=ap-northeast-1")?;
        fs::write(base.join(".env.prod"), "LAMP_REGION=us-east-1")?;

        Ok(())
    }

    #[test]
    fn test_discover_files() -> Result<()> {
        let temp_dir = tempfile::tempdir().unwrap();
        let project_root = temp_dir.path();
        create_test_project(project_root)?;

        let discovered = discover_files(project_root)?;

        assert!(discovered.root.is_some());
        assert_eq!(discovered.resources.len(), 3);
        assert!(discovered.resources[0].ends_with("resources/alb.kdl"));
        assert!(discovered.resources[1].ends_with("resources/dns/zone.kdl"));
        assert!(discovered.resources[2].ends_with("resources/network.kdl"));
        assert_eq!(discovered.variables.len(), 1);
        assert!(discovered.local_override.is_some());
        assert!(discovered.env_file.is_some());

        // ステージ未指定ならステージファイルは拾わない
        assert!(discovered.stage_override.is_none());
        assert!(discovered.stage_env_file.is_none());

        Ok(())
    }

    #[test]
    fn test_discover_files_with_stage() -> Result<()> {
        let temp_dir = tempfile::tempdir().unwrap();
        let project_root = temp_dir.path();
        create_test_project(project_root)?;

        let discovered = discover_files_with_stage(project_root, Some("prod"))?;
        assert!(discovered.stage_override.unwrap().ends_with("stack.prod.kdl"));
        assert!(discovered.stage_env_file.unwrap().ends_with(".env.prod"));

        let discovered = discover_files_with_stage(project_root, Some("dev"))?;
        assert!(discovered.stage_override.is_none());

        Ok(())
    }

    #[test]
    fn test_definition_file_order() -> Result<()> {
        let temp_dir = tempfile::tempdir().unwrap();
        let project_root = temp_dir.path();
        create_test_project(project_root)?;

        let discovered = discover_files_with_stage(project_root, Some("prod"))?;
        let files = discovered.definition_files();

        assert_eq!(files.len(), 6);
        assert!(files[0].ends_with("stack.kdl"));
        assert!(files[4].ends_with("stack.prod.kdl"));
        assert!(files[5].ends_with("stack.local.kdl"));

        Ok(())
    }

    #[test]
    fn test_discover_in_dot_lampstack() -> Result<()> {
        let temp_dir = tempfile::tempdir().unwrap();
        let project_root = temp_dir.path();
        fs::create_dir_all(project_root.join(".lampstack"))?;
        fs::write(project_root.join(".lampstack/stack.kdl"), "// root")?;

        let discovered = discover_files(project_root)?;
        assert!(discovered.root.unwrap().ends_with(".lampstack/stack.kdl"));

        Ok(())
    }

    #[test]
    fn test_find_project_root_walks_up() -> Result<()> {
        let temp_dir = tempfile::tempdir().unwrap();
        let project_root = temp_dir.path();
        fs::write(project_root.join("stack.kdl"), "// root")?;
        let nested = project_root.join("a/b/c");
        fs::create_dir_all(&nested)?;

        let found = find_project_root_from(&nested)?;
        assert_eq!(found.canonicalize()?, project_root.canonicalize()?);

        Ok(())
    }

    #[test]
    fn test_find_project_root_not_found() {
        let temp_dir = tempfile::tempdir().unwrap();
        let result = find_project_root_from(temp_dir.path());
        assert!(matches!(result, Err(StackError::ProjectRootNotFound(_))));
    }

    #[test]
    #[serial]
    fn test_find_project_root_from_env() -> Result<()> {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::write(temp_dir.path().join("stack.kdl"), "// root")?;

        let found = temp_env::with_var(PROJECT_ROOT_ENV, Some(temp_dir.path()), find_project_root)?;
        assert_eq!(found, temp_dir.path());

        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_loop_is_skipped() -> Result<()> {
        let temp_dir = tempfile::tempdir().unwrap();
        let resources = temp_dir.path().join("resources");
        fs::create_dir_all(&resources)?;
        fs::write(resources.join("a.kdl"), "// a")?;
        std::os::unix::fs::symlink(&resources, resources.join("loop"))?;

        let files = discover_kdl_files(&resources)?;
        assert_eq!(files.len(), 1);

        Ok(())
    }
}
