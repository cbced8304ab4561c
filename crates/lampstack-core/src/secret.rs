//! シークレット参照
//!
//! 認証情報をスタック定義に直接書く代わりに、シークレットストアへの参照を記述します。
//! 値そのものはこのクレートでは読み込まず、ECSが起動時に解決します。
//!
//! ## 参照形式
//!
//! ```text
//! ssm:/lamp/mysql/root-password
//! secretsmanager:lamp/mysql
//! secretsmanager:lamp/mysql#password
//! secretsmanager:arn:aws:secretsmanager:ap-northeast-1:123456789012:secret:lamp/mysql-AbCdEf#password
//! ```
//!
//! ## セキュリティ
//!
//! - 参照文字列のみを扱い、秘密情報はログにもエラーメッセージにも含まれません

use crate::error::{Result, StackError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// SSM Parameter Store 参照のプレフィックス
const SSM_PREFIX: &str = "ssm:";

/// Secrets Manager 参照のプレフィックス
const SECRETS_MANAGER_PREFIX: &str = "secretsmanager:";

/// シークレットストアへの参照
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SecretRef {
    /// SSM Parameter Store のパラメータ名（またはARN）
    Ssm { parameter: String },
    /// Secrets Manager のシークレット名（またはARN）とJSONキー
    SecretsManager {
        secret: String,
        json_key: Option<String>,
    },
}

/// 値がシークレット参照の形式かどうか
pub fn is_secret_reference(value: &str) -> bool {
    value.starts_with(SSM_PREFIX) || value.starts_with(SECRETS_MANAGER_PREFIX)
}

impl SecretRef {
    /// 参照文字列をパース
    pub fn parse(reference: &str) -> Result<Self> {
        if let Some(parameter) = reference.strip_prefix(SSM_PREFIX) {
            if parameter.is_empty() {
                return Err(StackError::InvalidSecretRef(format!(
                    "{}: パラメータ名が空です",
                    reference
                )));
            }
            return Ok(Self::Ssm {
                parameter: parameter.to_string(),
            });
        }

        if let Some(rest) = reference.strip_prefix(SECRETS_MANAGER_PREFIX) {
            let (secret, json_key) = match rest.split_once('#') {
                Some((secret, key)) if !key.is_empty() => (secret, Some(key.to_string())),
                Some((_, _)) => {
                    return Err(StackError::InvalidSecretRef(format!(
                        "{}: '#' の後にJSONキーがありません",
                        reference
                    )));
                }
                None => (rest, None),
            };
            if secret.is_empty() {
                return Err(StackError::InvalidSecretRef(format!(
                    "{}: シークレット名が空です",
                    reference
                )));
            }
            if json_key.is_some() && !secret.starts_with("arn:") {
                return Err(StackError::InvalidSecretRef(format!(
                    "{}: JSONキーを指定する場合はシークレットのARNが必要です",
                    reference
                )));
            }
            return Ok(Self::SecretsManager {
                secret: secret.to_string(),
                json_key,
            });
        }

        Err(StackError::InvalidSecretRef(format!(
            "{} (ssm: または secretsmanager: で始まる必要があります)",
            reference
        )))
    }

    /// ECSコンテナ定義の `ValueFrom` に渡す文字列
    pub fn value_from(&self) -> String {
        match self {
            Self::Ssm { parameter } => parameter.clone(),
            Self::SecretsManager {
                secret,
                json_key: Some(key),
            } => format!("{}:{}::", secret, key),
            Self::SecretsManager {
                secret,
                json_key: None,
            } => secret.clone(),
        }
    }

    /// ECS実行ロールが必要とするIAMアクション
    pub fn iam_action(&self) -> &'static str {
        match self {
            Self::Ssm { .. } => "ssm:GetParameters",
            Self::SecretsManager { .. } => "secretsmanager:GetSecretValue",
        }
    }
}

impl FromStr for SecretRef {
    type Err = StackError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for SecretRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ssm { parameter } => write!(f, "{}{}", SSM_PREFIX, parameter),
            Self::SecretsManager {
                secret,
                json_key: Some(key),
            } => write!(f, "{}{}#{}", SECRETS_MANAGER_PREFIX, secret, key),
            Self::SecretsManager {
                secret,
                json_key: None,
            } => write!(f, "{}{}", SECRETS_MANAGER_PREFIX, secret),
        }
    }
}

impl Serialize for SecretRef {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SecretRef {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
