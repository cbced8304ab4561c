//! ネットワーク定義

use crate::error::{Result, StackError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

/// デプロイ先のアカウントとリージョン
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    pub account: Option<String>,
    pub region: Option<String>,
}

/// 既存VPCへの参照
///
/// VPC・サブネットはこのスタックでは作成せず、IDで参照するだけ。
/// サブネットが空の場合はデプロイ時にパラメータとして要求される。
///
/// ```kdl
/// network {
///     vpc "vpc-02b5eb5d25b928589"
///     public-subnets "subnet-aaa" "subnet-bbb"
///     private-subnets "subnet-ccc" "subnet-ddd"
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    pub vpc_id: String,
    #[serde(default)]
    pub public_subnets: Vec<String>,
    #[serde(default)]
    pub private_subnets: Vec<String>,
}

impl Network {
    pub fn subnets(&self, selection: SubnetSelection) -> &[String] {
        match selection {
            SubnetSelection::Public => &self.public_subnets,
            SubnetSelection::Private => &self.private_subnets,
        }
    }
}

/// サブネットの選択
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubnetSelection {
    Public,
    #[default]
    Private,
}

impl SubnetSelection {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "public" => Some(Self::Public),
            "private" => Some(Self::Private),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
        }
    }
}

/// IPv4 CIDR ブロック
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Cidr {
    addr: Ipv4Addr,
    prefix: u8,
}

impl Cidr {
    /// すべてのIPv4アドレス (0.0.0.0/0)
    pub const ANY: Cidr = Cidr {
        addr: Ipv4Addr::UNSPECIFIED,
        prefix: 0,
    };

    pub fn new(addr: Ipv4Addr, prefix: u8) -> Result<Self> {
        if prefix > 32 {
            return Err(StackError::InvalidCidr(format!(
                "{}/{}: プレフィックス長は32以下である必要があります",
                addr, prefix
            )));
        }
        let mask = if prefix == 0 {
            0
        } else {
            u32::MAX << (32 - u32::from(prefix))
        };
        if u32::from(addr) & !mask != 0 {
            return Err(StackError::InvalidCidr(format!(
                "{}/{}: ホスト部が0ではありません",
                addr, prefix
            )));
        }
        Ok(Self { addr, prefix })
    }

    /// 検証済みの定数から組み立てる
    pub(crate) const fn from_parts(addr: Ipv4Addr, prefix: u8) -> Self {
        Self { addr, prefix }
    }

    pub fn addr(&self) -> Ipv4Addr {
        self.addr
    }

    pub fn prefix(&self) -> u8 {
        self.prefix
    }
}

impl FromStr for Cidr {
    type Err = StackError;

    fn from_str(s: &str) -> Result<Self> {
        let (addr, prefix) = s
            .split_once('/')
            .ok_or_else(|| StackError::InvalidCidr(format!("{}: '/' がありません", s)))?;
        let addr: Ipv4Addr = addr
            .parse()
            .map_err(|_| StackError::InvalidCidr(format!("{}: IPv4アドレスが不正です", s)))?;
        let prefix: u8 = prefix
            .parse()
            .map_err(|_| StackError::InvalidCidr(format!("{}: プレフィックス長が不正です", s)))?;
        Cidr::new(addr, prefix)
    }
}

impl fmt::Display for Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.prefix)
    }
}

impl Serialize for Cidr {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Cidr {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_host_cidr() {
        let cidr: Cidr = "122.210.238.201/32".parse().unwrap();
        assert_eq!(cidr.addr(), Ipv4Addr::new(122, 210, 238, 201));
        assert_eq!(cidr.prefix(), 32);
        assert_eq!(cidr.to_string(), "122.210.238.201/32");
    }

    #[test]
    fn test_parse_network_cidr() {
        let cidr: Cidr = "10.0.16.0/20".parse().unwrap();
        assert_eq!(cidr.prefix(), 20);
    }

    #[test]
    fn test_reject_host_bits() {
        // 10.0.1.0/20 はホスト部が0ではない
        assert!("10.0.1.0/20".parse::<Cidr>().is_err());
    }

    #[test]
    fn test_reject_malformed() {
        assert!("10.0.0.0".parse::<Cidr>().is_err());
        assert!("10.0.0.0/33".parse::<Cidr>().is_err());
        assert!("10.0.0/8".parse::<Cidr>().is_err());
        assert!("any/0".parse::<Cidr>().is_err());
    }

    #[test]
    fn test_any() {
        assert_eq!(Cidr::ANY.to_string(), "0.0.0.0/0");
        assert_eq!("0.0.0.0/0".parse::<Cidr>().unwrap(), Cidr::ANY);
    }

    #[test]
    fn test_subnet_selection() {
        let network = Network {
            vpc_id: "vpc-1".to_string(),
            public_subnets: vec!["subnet-pub".to_string()],
            private_subnets: vec!["subnet-priv".to_string()],
        };
        assert_eq!(network.subnets(SubnetSelection::Public), ["subnet-pub"]);
        assert_eq!(network.subnets(SubnetSelection::Private), ["subnet-priv"]);
        assert_eq!(SubnetSelection::parse("PUBLIC"), Some(SubnetSelection::Public));
        assert_eq!(SubnetSelection::parse("isolated"), None);
    }
}
