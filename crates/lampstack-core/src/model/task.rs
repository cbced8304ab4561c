//! タスク定義とサービス

use super::port::PortMapping;
use super::volume::{MountPoint, Volume};
use crate::secret::SecretRef;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// ECSタスクのネットワークモード
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkMode {
    #[default]
    Bridge,
    Host,
    Awsvpc,
}

impl NetworkMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "bridge" => Some(Self::Bridge),
            "host" => Some(Self::Host),
            "awsvpc" => Some(Self::Awsvpc),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bridge => "bridge",
            Self::Host => "host",
            Self::Awsvpc => "awsvpc",
        }
    }
}

/// タスク定義（EC2起動タイプ）
///
/// KDL形式：
/// ```kdl
/// task "LampTaskDef" {
///     volume "html-data"
///     container "mysql-container" {
///         image "public.ecr.aws/docker/library/mysql:9.2.0"
///         memory 1024
///         cpu 512
///         port container=3306 host=3306
///     }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSpec {
    pub id: String,
    #[serde(default)]
    pub network_mode: NetworkMode,
    #[serde(default)]
    pub volumes: Vec<Volume>,
    /// 宣言順を保持する
    pub containers: Vec<ContainerSpec>,
}

impl TaskSpec {
    pub fn container(&self, name: &str) -> Option<&ContainerSpec> {
        self.containers.iter().find(|c| c.name == name)
    }

    pub fn has_secrets(&self) -> bool {
        self.containers.iter().any(|c| !c.secrets.is_empty())
    }
}

/// コンテナイメージ参照
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub repository: String,
    pub tag: String,
}

impl ImageRef {
    pub fn new(repository: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            tag: tag.into(),
        }
    }

    /// `repo/name:tag` 形式をパース（タグ省略時は latest）
    ///
    /// レジストリのポート指定 (`host:5000/name`) はタグとして扱わない
    pub fn parse(s: &str) -> Self {
        match s.rsplit_once(':') {
            Some((repo, tag)) if !tag.contains('/') && !repo.is_empty() => Self::new(repo, tag),
            _ => Self::new(s, "latest"),
        }
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.repository, self.tag)
    }
}

/// コンテナ定義
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSpec {
    pub name: String,
    pub image: ImageRef,
    /// CPUユニット
    pub cpu: Option<u32>,
    /// メモリ上限 (MiB)
    pub memory_mib: Option<u32>,
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
    /// 環境変数名 → シークレットストア参照
    #[serde(default)]
    pub secrets: BTreeMap<String, SecretRef>,
    #[serde(default)]
    pub ports: Vec<PortMapping>,
    #[serde(default)]
    pub mounts: Vec<MountPoint>,
    /// 起動コマンドの上書き
    #[serde(default)]
    pub command: Vec<String>,
    /// awslogs のストリームプレフィックス
    pub log_stream_prefix: Option<String>,
    #[serde(default = "default_essential")]
    pub essential: bool,
}

impl ContainerSpec {
    pub fn new(name: impl Into<String>, image: ImageRef) -> Self {
        Self {
            name: name.into(),
            image,
            cpu: None,
            memory_mib: None,
            environment: BTreeMap::new(),
            secrets: BTreeMap::new(),
            ports: Vec::new(),
            mounts: Vec::new(),
            command: Vec::new(),
            log_stream_prefix: None,
            essential: true,
        }
    }
}

fn default_essential() -> bool {
    true
}

/// ECSサービス
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EcsService {
    pub id: String,
    /// Cluster の論理ID
    pub cluster: String,
    /// TaskSpec の論理ID
    pub task: String,
    #[serde(default = "default_desired_count")]
    pub desired_count: u32,
    #[serde(default = "default_min_healthy_percent")]
    pub min_healthy_percent: u32,
    #[serde(default = "default_max_percent")]
    pub max_percent: u32,
}

impl EcsService {
    pub fn new(id: impl Into<String>, cluster: impl Into<String>, task: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            cluster: cluster.into(),
            task: task.into(),
            desired_count: default_desired_count(),
            min_healthy_percent: default_min_healthy_percent(),
            max_percent: default_max_percent(),
        }
    }
}

fn default_desired_count() -> u32 {
    1
}

fn default_min_healthy_percent() -> u32 {
    50
}

fn default_max_percent() -> u32 {
    200
}
