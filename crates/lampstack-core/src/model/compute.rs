//! コンピュートリソース定義
//!
//! Auto Scaling グループ、ECSクラスター、キャパシティプロバイダーの定義

use super::network::SubnetSelection;
use serde::{Deserialize, Serialize};
use std::fmt;

/// ECS最適化 Amazon Linux 2023 AMI の公開SSMパラメータ
pub const ECS_AL2023_AMI_PARAMETER: &str =
    "/aws/service/ecs/optimized-ami/amazon-linux-2023/recommended/image_id";

/// ECS最適化 Amazon Linux 2 AMI の公開SSMパラメータ
pub const ECS_AL2_AMI_PARAMETER: &str =
    "/aws/service/ecs/optimized-ami/amazon-linux-2/recommended/image_id";

/// 既存のIAMロールへの参照（変更しない）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalRole {
    pub id: String,
    pub arn: String,
}

impl ExternalRole {
    /// ARNからロール名を取り出す
    ///
    /// `arn:aws:iam::123456789012:role/path/ecsInstanceRole` → `ecsInstanceRole`
    pub fn role_name(&self) -> Option<&str> {
        let resource = self.arn.splitn(6, ':').nth(5)?;
        let path = resource.strip_prefix("role/")?;
        path.rsplit('/').next().filter(|name| !name.is_empty())
    }
}

/// インスタンスタイプ（例: t2.small）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceType {
    pub class: String,
    pub size: String,
}

impl InstanceType {
    pub fn of(class: impl Into<String>, size: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            size: size.into(),
        }
    }

    /// "t2.small" 形式からパース
    pub fn parse(s: &str) -> Option<Self> {
        let (class, size) = s.split_once('.')?;
        if class.is_empty() || size.is_empty() || size.contains('.') {
            return None;
        }
        Some(Self::of(class.to_lowercase(), size.to_lowercase()))
    }
}

impl fmt::Display for InstanceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.class, self.size)
    }
}

/// マシンイメージ
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MachineImage {
    /// ECS最適化 Amazon Linux 2023
    EcsAmazonLinux2023,
    /// ECS最適化 Amazon Linux 2
    EcsAmazonLinux2,
    /// 明示的なAMI ID
    Ami(String),
}

impl MachineImage {
    pub fn parse(s: &str) -> Self {
        match s {
            "ecs-al2023" | "ecs-amazon-linux-2023" => Self::EcsAmazonLinux2023,
            "ecs-al2" | "ecs-amazon-linux-2" => Self::EcsAmazonLinux2,
            other => Self::Ami(other.to_string()),
        }
    }

    /// 公開SSMパラメータ経由で解決されるイメージの場合はパラメータ名
    pub fn ssm_parameter(&self) -> Option<&'static str> {
        match self {
            Self::EcsAmazonLinux2023 => Some(ECS_AL2023_AMI_PARAMETER),
            Self::EcsAmazonLinux2 => Some(ECS_AL2_AMI_PARAMETER),
            Self::Ami(_) => None,
        }
    }
}

/// キャパシティ設定
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capacity {
    pub min: u32,
    pub max: u32,
    pub desired: u32,
}

impl Default for Capacity {
    fn default() -> Self {
        Self {
            min: 1,
            max: 1,
            desired: 1,
        }
    }
}

/// Auto Scaling によるインスタンスプール
///
/// KDL形式：
/// ```kdl
/// compute "EcsAutoScalingGroup" {
///     instance-type "t2.small"
///     machine-image "ecs-al2023"
///     capacity min=1 max=3 desired=1
///     subnets "private"
///     role "ExistingEcsRole"
///     security-group "EcsInstanceSecurityGroup"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputePool {
    pub id: String,
    pub instance_type: InstanceType,
    pub machine_image: MachineImage,
    pub capacity: Capacity,
    #[serde(default)]
    pub subnets: SubnetSelection,
    /// ExternalRole の論理ID
    pub role: String,
    /// SecurityGroup の論理ID
    pub security_group: String,
}

/// ECSクラスター
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cluster {
    pub id: String,
    pub capacity_provider: Option<CapacityProvider>,
}

/// Auto Scaling グループをクラスターに結びつけるキャパシティプロバイダー
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapacityProvider {
    pub id: String,
    /// ComputePool の論理ID
    pub compute: String,
    #[serde(default = "default_true")]
    pub managed_scaling: bool,
    #[serde(default = "default_target_capacity")]
    pub target_capacity: u32,
    /// 有効な場合は Auto Scaling グループもスケールイン保護になる
    #[serde(default = "default_true")]
    pub managed_termination_protection: bool,
}

impl CapacityProvider {
    pub fn for_compute(id: impl Into<String>, compute: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            compute: compute.into(),
            managed_scaling: true,
            target_capacity: default_target_capacity(),
            managed_termination_protection: true,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_target_capacity() -> u32 {
    100
}
