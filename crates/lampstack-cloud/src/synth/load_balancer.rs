//! Application load balancer, target groups, listeners and rules

use super::{network, security};
use crate::error::Result;
use crate::intrinsic::{get_att, reference};
use crate::template::{Resource, Template};
use lampstack_core::{
    Condition, Listener, ListenerRule, LoadBalancer, Protocol, Stack, TargetGroup,
};
use serde_json::{Value, json};
use tracing::debug;

pub(super) fn synthesize(stack: &Stack, template: &mut Template) -> Result<()> {
    for lb in &stack.load_balancers {
        let subnets = network::subnets(stack, template, lb.subnets)?;
        let scheme = if lb.internet_facing {
            "internet-facing"
        } else {
            "internal"
        };
        template.add_resource(
            &lb.id,
            Resource::new(
                "AWS::ElasticLoadBalancingV2::LoadBalancer",
                json!({
                    "Type": "application",
                    "Scheme": scheme,
                    "SecurityGroups": [get_att(&lb.security_group, "GroupId")],
                    "Subnets": subnets,
                }),
            ),
        )?;

        for tg in &lb.target_groups {
            synthesize_target_group(stack, template, lb, tg)?;
        }
        for listener in &lb.listeners {
            synthesize_listener(template, lb, listener)?;
        }
    }
    Ok(())
}

fn synthesize_target_group(
    stack: &Stack,
    template: &mut Template,
    lb: &LoadBalancer,
    tg: &TargetGroup,
) -> Result<()> {
    let health = &tg.health_check;
    let mut properties = json!({
        "Port": tg.port,
        "Protocol": tg.protocol.as_str(),
        "TargetType": tg.target_type.as_str(),
        "VpcId": network::vpc(),
        "HealthCheckPath": health.path,
        "HealthCheckIntervalSeconds": health.interval_secs,
    });
    if let Some(name) = &tg.name {
        properties["Name"] = json!(name);
    }
    if let Some(timeout) = health.timeout_secs {
        properties["HealthCheckTimeoutSeconds"] = json!(timeout);
    }
    if let Some(healthy) = health.healthy_threshold {
        properties["HealthyThresholdCount"] = json!(healthy);
    }
    if let Some(unhealthy) = health.unhealthy_threshold {
        properties["UnhealthyThresholdCount"] = json!(unhealthy);
    }
    template.add_resource(
        &tg.id,
        Resource::new("AWS::ElasticLoadBalancingV2::TargetGroup", properties),
    )?;

    // targets accept traffic from the load balancer on the target port
    for target in &tg.targets {
        let Some(pool) = stack.compute_pool(target) else {
            continue;
        };
        debug!(
            target_group = %tg.id,
            compute = %pool.id,
            port = tg.port,
            "Allowing load balancer traffic to targets"
        );
        security::peer_ingress(
            template,
            &pool.security_group,
            &lb.security_group,
            Protocol::Tcp,
            tg.port,
            Some("Load balancer to target"),
        )?;
    }
    Ok(())
}

fn forward(target_group: &str) -> Value {
    json!({ "Type": "forward", "TargetGroupArn": reference(target_group) })
}

fn synthesize_listener(template: &mut Template, lb: &LoadBalancer, listener: &Listener) -> Result<()> {
    template.add_resource(
        &listener.id,
        Resource::new(
            "AWS::ElasticLoadBalancingV2::Listener",
            json!({
                "LoadBalancerArn": reference(&lb.id),
                "Port": listener.port,
                "Protocol": listener.protocol.as_str(),
                "DefaultActions": [forward(&listener.default_target_group)],
            }),
        ),
    )?;

    if listener.open {
        security::open_to_world(template, &lb.security_group, listener.port)?;
    }

    for rule in &listener.rules {
        synthesize_rule(template, listener, rule)?;
    }
    Ok(())
}

fn synthesize_rule(template: &mut Template, listener: &Listener, rule: &ListenerRule) -> Result<()> {
    let conditions: Vec<Value> = rule.conditions.iter().map(condition).collect();
    template.add_resource(
        &rule.id,
        Resource::new(
            "AWS::ElasticLoadBalancingV2::ListenerRule",
            json!({
                "ListenerArn": reference(&listener.id),
                "Priority": rule.priority,
                "Conditions": conditions,
                "Actions": [forward(&rule.forward)],
            }),
        ),
    )
}

fn condition(condition: &Condition) -> Value {
    match condition {
        Condition::HostHeader(values) => json!({
            "Field": "host-header",
            "HostHeaderConfig": { "Values": values },
        }),
        Condition::PathPattern(values) => json!({
            "Field": "path-pattern",
            "PathPatternConfig": { "Values": values },
        }),
    }
}
