//! ロードバランサー定義
//!
//! Application Load Balancer、リスナー、リスナールール、ターゲットグループ

use super::network::SubnetSelection;
use serde::{Deserialize, Serialize};

/// アプリケーションプロトコル
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AppProtocol {
    #[default]
    Http,
    Https,
}

impl AppProtocol {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "HTTP" => Some(Self::Http),
            "HTTPS" => Some(Self::Https),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Http => "HTTP",
            Self::Https => "HTTPS",
        }
    }
}

/// ターゲット種別
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetType {
    #[default]
    Instance,
    Ip,
}

impl TargetType {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "instance" => Some(Self::Instance),
            "ip" => Some(Self::Ip),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Instance => "instance",
            Self::Ip => "ip",
        }
    }
}

/// ヘルスチェック設定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheck {
    pub path: String,
    pub interval_secs: u32,
    pub timeout_secs: Option<u32>,
    pub healthy_threshold: Option<u32>,
    pub unhealthy_threshold: Option<u32>,
}

impl Default for HealthCheck {
    fn default() -> Self {
        Self {
            path: "/".to_string(),
            interval_secs: 30,
            timeout_secs: None,
            healthy_threshold: None,
            unhealthy_threshold: None,
        }
    }
}

/// ターゲットグループ
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetGroup {
    pub id: String,
    /// 物理名（省略時はCloudFormationが生成）
    pub name: Option<String>,
    #[serde(default)]
    pub protocol: AppProtocol,
    pub port: u16,
    #[serde(default)]
    pub target_type: TargetType,
    #[serde(default)]
    pub health_check: HealthCheck,
    /// ターゲットとして登録する ComputePool の論理ID
    #[serde(default)]
    pub targets: Vec<String>,
}

/// リスナールールの条件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Condition {
    HostHeader(Vec<String>),
    PathPattern(Vec<String>),
}

/// リスナールール（優先度付きのマッチ → forward）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListenerRule {
    pub id: String,
    pub priority: u32,
    pub conditions: Vec<Condition>,
    /// 転送先 TargetGroup の論理ID
    pub forward: String,
}

/// リスナー
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listener {
    pub id: String,
    pub port: u16,
    #[serde(default)]
    pub protocol: AppProtocol,
    /// 有効にするとリスナーポートを 0.0.0.0/0 に開放する
    #[serde(default)]
    pub open: bool,
    /// デフォルトの転送先 TargetGroup の論理ID
    pub default_target_group: String,
    #[serde(default)]
    pub rules: Vec<ListenerRule>,
}

/// Application Load Balancer
///
/// KDL形式：
/// ```kdl
/// load-balancer "LampALB" {
///     internet-facing #true
///     subnets "public"
///     security-group "ALBSecurityGroup"
///     target-group "LampTarget" port=8888 name="LampTargetGroup" {
///         health-check path="/" interval=30
///         target "EcsAutoScalingGroup"
///     }
///     listener "MyListener" port=80 {
///         default-action forward="LampTarget"
///         rule "PhpMyAdminRule" priority=1 forward="PhpMyAdminTG" {
///             host-header "test.lamp.example.net"
///         }
///     }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadBalancer {
    pub id: String,
    #[serde(default = "default_internet_facing")]
    pub internet_facing: bool,
    pub subnets: SubnetSelection,
    /// SecurityGroup の論理ID
    pub security_group: String,
    #[serde(default)]
    pub target_groups: Vec<TargetGroup>,
    #[serde(default)]
    pub listeners: Vec<Listener>,
}

impl LoadBalancer {
    pub fn target_group(&self, id: &str) -> Option<&TargetGroup> {
        self.target_groups.iter().find(|tg| tg.id == id)
    }
}

fn default_internet_facing() -> bool {
    true
}
