//! Stack定義

use super::compute::{Cluster, ComputePool, ExternalRole};
use super::dns::{AliasRecord, HostedZone};
use super::load_balancer::LoadBalancer;
use super::network::{Environment, Network};
use super::security::SecurityGroup;
use super::task::{EcsService, TaskSpec};
use serde::{Deserialize, Serialize};

/// Stack - インフラの設計図
///
/// 1つのデプロイ単位として同時に作成・削除されるリソースの集合。
/// 各リソースは論理IDを持ち、スタック内で一意である必要がある。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stack {
    /// スタック名
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub environment: Environment,
    #[serde(default)]
    pub network: Network,
    #[serde(default)]
    pub security_groups: Vec<SecurityGroup>,
    #[serde(default)]
    pub roles: Vec<ExternalRole>,
    #[serde(default)]
    pub compute: Vec<ComputePool>,
    #[serde(default)]
    pub clusters: Vec<Cluster>,
    #[serde(default)]
    pub tasks: Vec<TaskSpec>,
    #[serde(default)]
    pub services: Vec<EcsService>,
    #[serde(default)]
    pub load_balancers: Vec<LoadBalancer>,
    #[serde(default)]
    pub hosted_zones: Vec<HostedZone>,
    #[serde(default)]
    pub records: Vec<AliasRecord>,
    #[serde(default)]
    pub outputs: Vec<Output>,
}

/// リソース種別（論理IDの重複検出・表示用）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    SecurityGroup,
    Role,
    Compute,
    Cluster,
    CapacityProvider,
    Task,
    Service,
    LoadBalancer,
    TargetGroup,
    Listener,
    ListenerRule,
    HostedZone,
    Record,
    Output,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SecurityGroup => "security-group",
            Self::Role => "role",
            Self::Compute => "compute",
            Self::Cluster => "cluster",
            Self::CapacityProvider => "capacity-provider",
            Self::Task => "task",
            Self::Service => "service",
            Self::LoadBalancer => "load-balancer",
            Self::TargetGroup => "target-group",
            Self::Listener => "listener",
            Self::ListenerRule => "rule",
            Self::HostedZone => "hosted-zone",
            Self::Record => "alias-record",
            Self::Output => "output",
        }
    }
}

impl Stack {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn security_group(&self, id: &str) -> Option<&SecurityGroup> {
        self.security_groups.iter().find(|sg| sg.id == id)
    }

    pub fn role(&self, id: &str) -> Option<&ExternalRole> {
        self.roles.iter().find(|r| r.id == id)
    }

    pub fn compute_pool(&self, id: &str) -> Option<&ComputePool> {
        self.compute.iter().find(|c| c.id == id)
    }

    pub fn cluster(&self, id: &str) -> Option<&Cluster> {
        self.clusters.iter().find(|c| c.id == id)
    }

    pub fn task(&self, id: &str) -> Option<&TaskSpec> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn load_balancer(&self, id: &str) -> Option<&LoadBalancer> {
        self.load_balancers.iter().find(|lb| lb.id == id)
    }

    pub fn hosted_zone(&self, id: &str) -> Option<&HostedZone> {
        self.hosted_zones.iter().find(|z| z.id == id)
    }

    /// スタック内のすべての論理IDを宣言順に列挙
    pub fn logical_ids(&self) -> Vec<(ResourceKind, &str)> {
        let mut ids = Vec::new();
        ids.extend(
            self.security_groups
                .iter()
                .map(|sg| (ResourceKind::SecurityGroup, sg.id.as_str())),
        );
        ids.extend(self.roles.iter().map(|r| (ResourceKind::Role, r.id.as_str())));
        ids.extend(
            self.compute
                .iter()
                .map(|c| (ResourceKind::Compute, c.id.as_str())),
        );
        for cluster in &self.clusters {
            ids.push((ResourceKind::Cluster, cluster.id.as_str()));
            if let Some(cp) = &cluster.capacity_provider {
                ids.push((ResourceKind::CapacityProvider, cp.id.as_str()));
            }
        }
        ids.extend(self.tasks.iter().map(|t| (ResourceKind::Task, t.id.as_str())));
        ids.extend(
            self.services
                .iter()
                .map(|s| (ResourceKind::Service, s.id.as_str())),
        );
        for lb in &self.load_balancers {
            ids.push((ResourceKind::LoadBalancer, lb.id.as_str()));
            ids.extend(
                lb.target_groups
                    .iter()
                    .map(|tg| (ResourceKind::TargetGroup, tg.id.as_str())),
            );
            for listener in &lb.listeners {
                ids.push((ResourceKind::Listener, listener.id.as_str()));
                ids.extend(
                    listener
                        .rules
                        .iter()
                        .map(|r| (ResourceKind::ListenerRule, r.id.as_str())),
                );
            }
        }
        ids.extend(
            self.hosted_zones
                .iter()
                .map(|z| (ResourceKind::HostedZone, z.id.as_str())),
        );
        ids.extend(
            self.records
                .iter()
                .map(|r| (ResourceKind::Record, r.id.as_str())),
        );
        ids.extend(
            self.outputs
                .iter()
                .map(|o| (ResourceKind::Output, o.id.as_str())),
        );
        ids
    }
}

/// スタック出力の値
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputValue {
    /// ロードバランサーの公開DNS名
    LoadBalancerDnsName(String),
}

/// スタック出力
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Output {
    pub id: String,
    pub value: OutputValue,
    pub description: Option<String>,
    pub export_name: Option<String>,
}
