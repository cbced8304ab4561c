//! load-balancer ノードのパース

use super::value::{
    name_arg, parse_enum, prop_bool, prop_int, prop_str, required_bool_arg, required_prop,
    required_prop_int, required_string_arg, string_args,
};
use crate::error::{Result, StackError};
use crate::model::{
    AppProtocol, Condition, HealthCheck, Listener, ListenerRule, LoadBalancer, SubnetSelection,
    TargetGroup, TargetType,
};
use kdl::KdlNode;

fn protocol_prop(node: &KdlNode) -> Result<AppProtocol> {
    match prop_str(node, "protocol") {
        Some(p) => parse_enum(node, p, AppProtocol::parse, "HTTP, HTTPS"),
        None => Ok(AppProtocol::Http),
    }
}

/// load-balancer ノードをパース
pub fn parse_load_balancer(node: &KdlNode) -> Result<LoadBalancer> {
    let id = name_arg(node)?;
    let mut lb = LoadBalancer {
        id: id.clone(),
        internet_facing: true,
        subnets: SubnetSelection::Public,
        security_group: String::new(),
        target_groups: Vec::new(),
        listeners: Vec::new(),
    };

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "internet-facing" => lb.internet_facing = required_bool_arg(child)?,
                "subnets" => {
                    lb.subnets = parse_enum(
                        child,
                        &required_string_arg(child)?,
                        SubnetSelection::parse,
                        "public, private",
                    )?;
                }
                "security-group" => lb.security_group = required_string_arg(child)?,
                "target-group" => lb.target_groups.push(parse_target_group(child)?),
                "listener" => lb.listeners.push(parse_listener(child)?),
                other => tracing::debug!(node = other, "unknown load-balancer child, skipped"),
            }
        }
    }

    if lb.security_group.is_empty() {
        return Err(StackError::MissingField {
            node: format!("load-balancer \"{}\"", id),
            field: "security-group".to_string(),
        });
    }

    Ok(lb)
}

/// target-group ノードをパース
fn parse_target_group(node: &KdlNode) -> Result<TargetGroup> {
    let mut tg = TargetGroup {
        id: name_arg(node)?,
        name: prop_str(node, "name").map(|s| s.to_string()),
        protocol: protocol_prop(node)?,
        port: required_prop_int(node, "port")?,
        target_type: match prop_str(node, "target-type") {
            Some(t) => parse_enum(node, t, TargetType::parse, "instance, ip")?,
            None => TargetType::Instance,
        },
        health_check: HealthCheck::default(),
        targets: Vec::new(),
    };

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "health-check" => tg.health_check = parse_health_check(child)?,
                "target" => tg.targets.extend(string_args(child)),
                other => tracing::debug!(node = other, "unknown target-group child, skipped"),
            }
        }
    }

    Ok(tg)
}

/// health-check ノードをパース
///
/// ```kdl
/// health-check path="/" interval=30 timeout=5 healthy=2 unhealthy=5
/// ```
fn parse_health_check(node: &KdlNode) -> Result<HealthCheck> {
    let defaults = HealthCheck::default();
    Ok(HealthCheck {
        path: prop_str(node, "path")
            .map(|s| s.to_string())
            .unwrap_or(defaults.path),
        interval_secs: prop_int(node, "interval")?.unwrap_or(defaults.interval_secs),
        timeout_secs: prop_int(node, "timeout")?,
        healthy_threshold: prop_int(node, "healthy")?,
        unhealthy_threshold: prop_int(node, "unhealthy")?,
    })
}

/// listener ノードをパース
fn parse_listener(node: &KdlNode) -> Result<Listener> {
    let id = name_arg(node)?;
    let mut listener = Listener {
        id: id.clone(),
        port: required_prop_int(node, "port")?,
        protocol: protocol_prop(node)?,
        open: prop_bool(node, "open")?.unwrap_or(false),
        default_target_group: String::new(),
        rules: Vec::new(),
    };

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "default-action" => listener.default_target_group = required_prop(child, "forward")?,
                "rule" => listener.rules.push(parse_rule(child)?),
                other => tracing::debug!(node = other, "unknown listener child, skipped"),
            }
        }
    }

    if listener.default_target_group.is_empty() {
        return Err(StackError::MissingField {
            node: format!("listener \"{}\"", id),
            field: "default-action".to_string(),
        });
    }

    Ok(listener)
}

/// rule ノードをパース
fn parse_rule(node: &KdlNode) -> Result<ListenerRule> {
    let mut rule = ListenerRule {
        id: name_arg(node)?,
        priority: required_prop_int(node, "priority")?,
        conditions: Vec::new(),
        forward: required_prop(node, "forward")?,
    };

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "host-header" => rule.conditions.push(Condition::HostHeader(string_args(child))),
                "path-pattern" => rule.conditions.push(Condition::PathPattern(string_args(child))),
                other => tracing::debug!(node = other, "unknown rule child, skipped"),
            }
        }
    }

    Ok(rule)
}
