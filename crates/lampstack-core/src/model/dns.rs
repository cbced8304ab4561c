//! DNS定義

use serde::{Deserialize, Serialize};

/// 既存のホストゾーンへの参照
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostedZone {
    pub id: String,
    pub zone_id: String,
    /// 末尾の `.` は不要
    pub zone_name: String,
}

/// エイリアスのターゲット
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AliasTarget {
    /// LoadBalancer の論理ID
    LoadBalancer(String),
}

/// Aレコード（エイリアス）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasRecord {
    pub id: String,
    /// HostedZone の論理ID
    pub zone: String,
    /// `*.lamp.example.net` のようなワイルドカードも可
    pub record_name: String,
    pub target: AliasTarget,
}

impl AliasRecord {
    pub fn is_wildcard(&self) -> bool {
        self.record_name.starts_with("*.")
    }

    /// Route 53 に渡す完全修飾名（末尾 `.` 付き）
    pub fn fqdn(&self) -> String {
        if self.record_name.ends_with('.') {
            self.record_name.clone()
        } else {
            format!("{}.", self.record_name)
        }
    }

    /// レコード名がゾーン配下にあるか
    pub fn is_within(&self, zone_name: &str) -> bool {
        let record = self.record_name.trim_end_matches('.');
        let zone = zone_name.trim_end_matches('.');
        record == zone || record.ends_with(&format!(".{}", zone))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str) -> AliasRecord {
        AliasRecord {
            id: "WildcardALBARecord".to_string(),
            zone: "MyHostedZone".to_string(),
            record_name: name.to_string(),
            target: AliasTarget::LoadBalancer("LampALB".to_string()),
        }
    }

    #[test]
    fn test_wildcard_record() {
        let r = record("*.lamp.sano.ss-sre-admin.net");
        assert!(r.is_wildcard());
        assert_eq!(r.fqdn(), "*.lamp.sano.ss-sre-admin.net.");
        assert!(r.is_within("sano.ss-sre-admin.net"));
        assert!(!r.is_within("ss-sre-admin.org"));
    }

    #[test]
    fn test_suffix_is_not_enough() {
        // "xsano.net" は "sano.net" の配下ではない
        let r = record("www.xsano.net");
        assert!(!r.is_within("sano.net"));
        assert!(!r.is_wildcard());
    }
}
