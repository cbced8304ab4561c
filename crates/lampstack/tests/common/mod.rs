use assert_cmd::Command;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub struct TestProject {
    pub root: TempDir,
}

impl TestProject {
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        Self { root }
    }

    #[allow(dead_code)]
    pub fn write_stack_kdl(&self, content: &str) {
        self.write("stack.kdl", content);
    }

    #[allow(dead_code)]
    pub fn write(&self, relative: &str, content: &str) {
        let path = self.root.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    #[allow(dead_code)]
    pub fn read(&self, relative: &str) -> String {
        fs::read_to_string(self.root.path().join(relative)).unwrap()
    }

    pub fn path(&self) -> PathBuf {
        self.root.path().to_path_buf()
    }

    /// ユーザー設定を参照しない `lamp` コマンド
    ///
    /// 設定ファイルは一時ディレクトリ内を指すので、書かなければ既定値。
    #[allow(deprecated)] // TODO: cargo_bin → cargo_bin_cmd! へ移行
    pub fn lamp(&self) -> Command {
        let mut cmd = Command::cargo_bin("lamp").unwrap();
        cmd.current_dir(self.path())
            .env("LAMPSTACK_CONFIG_PATH", config_path(self.root.path()))
            .env_remove("LAMP_STAGE")
            .env_remove("LAMPSTACK_PROJECT_ROOT")
            .env_remove("RUST_LOG");
        cmd
    }

    /// ユーザー設定ファイルを書く
    #[allow(dead_code)]
    pub fn write_user_config(&self, content: &str) {
        let path = config_path(self.root.path());
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }
}

fn config_path(root: &Path) -> PathBuf {
    root.join(".user-config").join("config.yaml")
}
