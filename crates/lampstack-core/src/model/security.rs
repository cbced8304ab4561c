//! セキュリティグループ定義

use super::network::Cidr;
use super::port::Protocol;
use serde::{Deserialize, Serialize};
use std::fmt;

/// セキュリティグループ
///
/// KDL形式：
/// ```kdl
/// security-group "ALBSecurityGroup" {
///     description "Allow HTTP from specific IP"
///     allow-all-outbound #true
///     ingress "122.210.238.201/32" port=80 description="Allow HTTP from specific IP"
///     ingress security-group="ALBSecurityGroup" port=8888
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityGroup {
    pub id: String,
    pub description: String,
    #[serde(default = "default_allow_all_outbound")]
    pub allow_all_outbound: bool,
    /// 宣言順を保持する
    #[serde(default)]
    pub ingress: Vec<IngressRule>,
}

impl SecurityGroup {
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            allow_all_outbound: true,
            ingress: Vec::new(),
        }
    }

    /// CIDRからのTCPルールを追加
    pub fn allow_tcp(mut self, cidr: Cidr, port: u16, description: impl Into<String>) -> Self {
        self.ingress.push(IngressRule {
            peer: Peer::Ipv4(cidr),
            protocol: Protocol::Tcp,
            port,
            description: Some(description.into()),
        });
        self
    }
}

fn default_allow_all_outbound() -> bool {
    true
}

/// インバウンドルール
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngressRule {
    pub peer: Peer,
    #[serde(default)]
    pub protocol: Protocol,
    pub port: u16,
    pub description: Option<String>,
}

/// 通信元
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Peer {
    /// 特定のIPv4レンジ
    Ipv4(Cidr),
    /// 任意のIPv4アドレス
    AnyIpv4,
    /// 同じスタック内の別のセキュリティグループ（論理ID）
    SecurityGroup(String),
}

impl Peer {
    pub fn cidr(&self) -> Option<Cidr> {
        match self {
            Peer::Ipv4(cidr) => Some(*cidr),
            Peer::AnyIpv4 => Some(Cidr::ANY),
            Peer::SecurityGroup(_) => None,
        }
    }
}

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Peer::Ipv4(cidr) => write!(f, "{}", cidr),
            Peer::AnyIpv4 => write!(f, "0.0.0.0/0"),
            Peer::SecurityGroup(id) => write!(f, "sg:{}", id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allow_tcp_keeps_order() {
        let sg = SecurityGroup::new("EdgeSG", "edge")
            .allow_tcp("113.37.225.8/32".parse().unwrap(), 80, "http")
            .allow_tcp("113.37.225.8/32".parse().unwrap(), 443, "https");

        assert!(sg.allow_all_outbound);
        assert_eq!(sg.ingress.len(), 2);
        assert_eq!(sg.ingress[0].port, 80);
        assert_eq!(sg.ingress[1].port, 443);
        assert_eq!(sg.ingress[1].description.as_deref(), Some("https"));
    }

    #[test]
    fn test_peer_cidr() {
        assert_eq!(Peer::AnyIpv4.cidr(), Some(Cidr::ANY));
        assert_eq!(Peer::SecurityGroup("x".into()).cidr(), None);
        assert_eq!(Peer::SecurityGroup("x".into()).to_string(), "sg:x");
    }
}
