//! ポート定義

use serde::{Deserialize, Serialize};

/// コンテナのポートマッピング
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortMapping {
    pub container: u16,
    pub host: u16,
    #[serde(default = "default_protocol")]
    pub protocol: Protocol,
}

impl PortMapping {
    pub fn tcp(container: u16, host: u16) -> Self {
        Self {
            container,
            host,
            protocol: Protocol::Tcp,
        }
    }
}

/// プロトコル種別
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Tcp,
    Udp,
}

impl Protocol {
    /// 文字列からProtocolをパース
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "tcp" => Some(Protocol::Tcp),
            "udp" => Some(Protocol::Udp),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tcp => "tcp",
            Self::Udp => "udp",
        }
    }
}

fn default_protocol() -> Protocol {
    Protocol::Tcp
}
