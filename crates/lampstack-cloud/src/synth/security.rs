//! Security groups and ingress rules

use super::network;
use crate::error::Result;
use crate::intrinsic::get_att;
use crate::template::{Resource, Template};
use lampstack_core::{Cidr, Peer, Protocol, Stack};
use serde_json::{Value, json};
use tracing::debug;

pub(super) const SECURITY_GROUP: &str = "AWS::EC2::SecurityGroup";
pub(super) const SECURITY_GROUP_INGRESS: &str = "AWS::EC2::SecurityGroupIngress";

pub(super) fn synthesize(stack: &Stack, template: &mut Template) -> Result<()> {
    for sg in &stack.security_groups {
        let inline: Vec<Value> = sg
            .ingress
            .iter()
            .filter_map(|rule| {
                rule.peer.cidr().map(|cidr| {
                    cidr_ingress(cidr, rule.protocol, rule.port, rule.description.as_deref())
                })
            })
            .collect();

        let mut properties = json!({
            "GroupDescription": sg.description,
            "VpcId": network::vpc(),
        });
        if !inline.is_empty() {
            properties["SecurityGroupIngress"] = Value::Array(inline);
        }
        properties["SecurityGroupEgress"] = egress(sg.allow_all_outbound);
        template.add_resource(&sg.id, Resource::new(SECURITY_GROUP, properties))?;

        for rule in &sg.ingress {
            if let Peer::SecurityGroup(source) = &rule.peer {
                peer_ingress(
                    template,
                    &sg.id,
                    source,
                    rule.protocol,
                    rule.port,
                    rule.description.as_deref(),
                )?;
            }
        }
    }
    Ok(())
}

fn cidr_ingress(cidr: Cidr, protocol: Protocol, port: u16, description: Option<&str>) -> Value {
    let mut rule = json!({
        "CidrIp": cidr.to_string(),
        "IpProtocol": protocol.as_str(),
        "FromPort": port,
        "ToPort": port,
    });
    if let Some(description) = description {
        rule["Description"] = json!(description);
    }
    rule
}

fn egress(allow_all_outbound: bool) -> Value {
    if allow_all_outbound {
        json!([{
            "CidrIp": "0.0.0.0/0",
            "Description": "Allow all outbound traffic by default",
            "IpProtocol": "-1",
        }])
    } else {
        // a rule matching nothing replaces the implicit allow-all
        json!([{
            "CidrIp": "255.255.255.255/32",
            "Description": "Disallow all traffic",
            "FromPort": 252,
            "IpProtocol": "icmp",
            "ToPort": 86,
        }])
    }
}

/// Ingress into `group` from another group of the stack
///
/// The rule is a standalone resource so that two groups may reference each
/// other. An existing rule for the same source, protocol and port is kept.
pub(super) fn peer_ingress(
    template: &mut Template,
    group: &str,
    source: &str,
    protocol: Protocol,
    port: u16,
    description: Option<&str>,
) -> Result<()> {
    let suffix = match protocol {
        Protocol::Tcp => "",
        Protocol::Udp => "Udp",
    };
    let id = format!("{}From{}{}{}", group, source, suffix, port);
    if template.resource(&id).is_some() {
        debug!(id = %id, "Ingress rule already present");
        return Ok(());
    }

    let mut properties = json!({
        "GroupId": get_att(group, "GroupId"),
        "SourceSecurityGroupId": get_att(source, "GroupId"),
        "IpProtocol": protocol.as_str(),
        "FromPort": port,
        "ToPort": port,
    });
    if let Some(description) = description {
        properties["Description"] = json!(description);
    }
    template.add_resource(id, Resource::new(SECURITY_GROUP_INGRESS, properties))
}

/// Open `port` to any IPv4 address on an already rendered group
pub(super) fn open_to_world(template: &mut Template, group: &str, port: u16) -> Result<()> {
    let rule = cidr_ingress(
        Cidr::ANY,
        Protocol::Tcp,
        port,
        Some(&format!("Allow from anyone on port {}", port)),
    );
    let Some(resource) = template.resource_mut(group) else {
        return Ok(());
    };

    let rules = resource
        .properties
        .entry("SecurityGroupIngress")
        .or_insert_with(|| Value::Array(Vec::new()));
    if let Value::Array(rules) = rules
        && !rules.iter().any(|existing| same_rule(existing, &rule))
    {
        rules.push(rule);
    }
    Ok(())
}

fn same_rule(a: &Value, b: &Value) -> bool {
    ["CidrIp", "IpProtocol", "FromPort", "ToPort"]
        .iter()
        .all(|key| a.get(key) == b.get(key))
}
