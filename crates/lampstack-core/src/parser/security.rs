//! security-group ノードのパース

use super::value::{
    name_arg, parse_enum, prop_str, required_bool_arg, required_prop_int,
    required_string_arg, string_arg,
};
use crate::error::{Result, StackError};
use crate::model::{Cidr, IngressRule, Peer, Protocol, SecurityGroup};
use kdl::KdlNode;

/// security-group ノードをパース
///
/// ```kdl
/// security-group "ALBSecurityGroup" {
///     description "Allow HTTP from specific IP"
///     allow-all-outbound #true
///     ingress "122.210.238.201/32" port=80 description="Allow HTTP from specific IP"
///     ingress security-group="OtherSG" port=8080
/// }
/// ```
pub fn parse_security_group(node: &KdlNode) -> Result<SecurityGroup> {
    let id = name_arg(node)?;
    let mut sg = SecurityGroup::new(id.clone(), id);

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "description" => sg.description = required_string_arg(child)?,
                "allow-all-outbound" => sg.allow_all_outbound = required_bool_arg(child)?,
                "ingress" => sg.ingress.push(parse_ingress(child)?),
                other => tracing::debug!(node = other, "unknown security-group child, skipped"),
            }
        }
    }

    Ok(sg)
}

/// ingress ノードをパース
///
/// 送信元は位置引数のCIDR（`"any"` は 0.0.0.0/0）か `security-group=` プロパティ
fn parse_ingress(node: &KdlNode) -> Result<IngressRule> {
    let peer = match (string_arg(node, 0), prop_str(node, "security-group")) {
        (Some(_), Some(_)) => {
            return Err(StackError::InvalidValue {
                node: "ingress".to_string(),
                message: "CIDR と security-group は同時に指定できません".to_string(),
            });
        }
        (Some("any"), None) => Peer::AnyIpv4,
        (Some(cidr), None) => Peer::Ipv4(cidr.parse::<Cidr>()?),
        (None, Some(sg)) => Peer::SecurityGroup(sg.to_string()),
        (None, None) => {
            return Err(StackError::MissingField {
                node: "ingress".to_string(),
                field: "peer".to_string(),
            });
        }
    };

    let protocol = match prop_str(node, "protocol") {
        Some(p) => parse_enum(node, p, Protocol::parse, "tcp, udp")?,
        None => Protocol::Tcp,
    };

    Ok(IngressRule {
        peer,
        protocol,
        port: required_prop_int(node, "port")?,
        description: prop_str(node, "description").map(|s| s.to_string()),
    })
}
