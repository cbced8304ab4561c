//! ユーザー設定
//!
//! `~/.config/lampstack/config.yaml` に保存される、プロジェクトをまたいだ既定値。
//!
//! ```yaml
//! default_stage: dev
//! output_format: yaml
//! region: ap-northeast-1
//! ```

pub mod error;

pub use error::*;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// 設定ファイルのパスを直接指定する環境変数
pub const CONFIG_PATH_ENV: &str = "LAMPSTACK_CONFIG_PATH";

const CONFIG_FILE_NAME: &str = "config.yaml";

/// テンプレートの出力形式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Json,
    Yaml,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Yaml => "yaml",
        }
    }
}

/// ユーザー設定
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserConfig {
    /// ステージ未指定時に使うステージ
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_stage: Option<String>,
    pub output_format: OutputFormat,
    /// スタックに region が書かれていない場合の既定値
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

/// lampstackの設定ディレクトリを取得（なければ作成）
pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or(ConfigError::ConfigDirNotFound)?
        .join("lampstack");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
    }

    Ok(config_dir)
}

/// 設定ファイルのパス
///
/// 1. 環境変数 LAMPSTACK_CONFIG_PATH
/// 2. ~/.config/lampstack/config.yaml
pub fn config_file_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        return Ok(PathBuf::from(path));
    }
    Ok(get_config_dir()?.join(CONFIG_FILE_NAME))
}

/// ユーザー設定を読み込む（ファイルがなければ既定値）
pub fn load_user_config() -> Result<UserConfig> {
    load_from(&config_file_path()?)
}

/// 指定パスから読み込む
pub fn load_from(path: &Path) -> Result<UserConfig> {
    if !path.exists() {
        debug!(path = %path.display(), "No user config, using defaults");
        return Ok(UserConfig::default());
    }

    let content = std::fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Ok(UserConfig::default());
    }
    serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;

    #[test]
    fn test_missing_file_is_default() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config = load_from(&temp_dir.path().join("config.yaml")).unwrap();
        assert_eq!(config, UserConfig::default());
        assert_eq!(config.output_format, OutputFormat::Json);
    }

    #[test]
    fn test_load_partial_config() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.yaml");
        fs::write(&path, "output_format: yaml\n").unwrap();

        let config = load_from(&path).unwrap();
        assert_eq!(config.output_format, OutputFormat::Yaml);
        assert_eq!(config.default_stage, None);
    }

    #[test]
    fn test_invalid_config() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.yaml");
        fs::write(&path, "output_format: xml\n").unwrap();

        let result = load_from(&path);
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_load_full_config() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.yaml");
        fs::write(
            &path,
            "default_stage: prod\noutput_format: yaml\nregion: ap-northeast-1\n",
        )
        .unwrap();

        let config = load_from(&path).unwrap();
        assert_eq!(
            config,
            UserConfig {
                default_stage: Some("prod".to_string()),
                output_format: OutputFormat::Yaml,
                region: Some("ap-northeast-1".to_string()),
            }
        );
    }

    #[test]
    #[serial]
    fn test_config_path_from_env() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("custom.yaml");
        fs::write(&path, "default_stage: dev\n").unwrap();

        temp_env::with_var(CONFIG_PATH_ENV, Some(&path), || {
            assert_eq!(config_file_path().unwrap(), path);
            let config = load_user_config().unwrap();
            assert_eq!(config.default_stage.as_deref(), Some("dev"));
        });
    }

    #[test]
    #[serial]
    fn test_get_config_dir() {
        let config_dir = get_config_dir().unwrap();
        assert!(config_dir.ends_with("lampstack"));
        assert!(config_dir.exists());
    }
}
