//! hosted-zone / alias-record / output ノードのパース

use super::value::{name_arg, prop_str, required_prop};
use crate::error::{Result, StackError};
use crate::model::{AliasRecord, AliasTarget, HostedZone, Output, OutputValue};
use kdl::KdlNode;

/// hosted-zone ノードをパース
///
/// ```kdl
/// hosted-zone "MyHostedZone" zone-id="Z0961844B43SYO7C4Q38" zone-name="sano.ss-sre-admin.net"
/// ```
pub fn parse_hosted_zone(node: &KdlNode) -> Result<HostedZone> {
    Ok(HostedZone {
        id: name_arg(node)?,
        zone_id: required_prop(node, "zone-id")?,
        zone_name: required_prop(node, "zone-name")?
            .trim_end_matches('.')
            .to_string(),
    })
}

/// alias-record ノードをパース
///
/// ```kdl
/// alias-record "WildcardALBARecord" zone="MyHostedZone" name="*.lamp.sano.ss-sre-admin.net" load-balancer="LampALB"
/// ```
pub fn parse_alias_record(node: &KdlNode) -> Result<AliasRecord> {
    Ok(AliasRecord {
        id: name_arg(node)?,
        zone: required_prop(node, "zone")?,
        record_name: required_prop(node, "name")?,
        target: AliasTarget::LoadBalancer(required_prop(node, "load-balancer")?),
    })
}

/// output ノードをパース
///
/// ```kdl
/// output "LoadBalancerDNS" load-balancer-dns="LampALB" description="ALB endpoint"
/// ```
pub fn parse_output(node: &KdlNode) -> Result<Output> {
    let id = name_arg(node)?;
    let value = match prop_str(node, "load-balancer-dns") {
        Some(lb) => OutputValue::LoadBalancerDnsName(lb.to_string()),
        None => {
            return Err(StackError::MissingField {
                node: format!("output \"{}\"", id),
                field: "load-balancer-dns".to_string(),
            });
        }
    };

    Ok(Output {
        id,
        value,
        description: prop_str(node, "description").map(|s| s.to_string()),
        export_name: prop_str(node, "export").map(|s| s.to_string()),
    })
}
