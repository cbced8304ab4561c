//! ECS cluster, capacity provider, task definition and service

use super::pascal_case;
use crate::error::Result;
use crate::intrinsic::{AWS_REGION, get_att, reference, sub};
use crate::template::{Resource, Template};
use lampstack_core::{Cluster, ContainerSpec, EcsService, SecretRef, Stack, TaskSpec};
use serde_json::{Value, json};
use std::collections::BTreeMap;

const POLICY_VERSION: &str = "2012-10-17";

pub(super) fn synthesize(stack: &Stack, template: &mut Template) -> Result<()> {
    for cluster in &stack.clusters {
        synthesize_cluster(template, cluster)?;
    }
    for task in &stack.tasks {
        synthesize_task(stack, template, task)?;
    }
    for service in &stack.services {
        synthesize_service(stack, template, service)?;
    }
    Ok(())
}

fn associations_id(cluster: &Cluster) -> String {
    format!("{}CapacityProviderAssociations", cluster.id)
}

fn synthesize_cluster(template: &mut Template, cluster: &Cluster) -> Result<()> {
    template.add_resource(&cluster.id, Resource::new("AWS::ECS::Cluster", json!({})))?;

    let Some(cp) = &cluster.capacity_provider else {
        return Ok(());
    };

    let mut managed_scaling = json!({ "Status": status(cp.managed_scaling) });
    if cp.managed_scaling {
        managed_scaling["TargetCapacity"] = json!(cp.target_capacity);
    }
    template.add_resource(
        &cp.id,
        Resource::new(
            "AWS::ECS::CapacityProvider",
            json!({
                "AutoScalingGroupProvider": {
                    "AutoScalingGroupArn": reference(&cp.compute),
                    "ManagedScaling": managed_scaling,
                    "ManagedTerminationProtection": status(cp.managed_termination_protection),
                }
            }),
        ),
    )?;

    template.add_resource(
        associations_id(cluster),
        Resource::new(
            "AWS::ECS::ClusterCapacityProviderAssociations",
            json!({
                "Cluster": reference(&cluster.id),
                "CapacityProviders": [reference(&cp.id)],
                "DefaultCapacityProviderStrategy": [
                    { "CapacityProvider": reference(&cp.id), "Weight": 1 }
                ],
            }),
        ),
    )
}

fn status(enabled: bool) -> &'static str {
    if enabled { "ENABLED" } else { "DISABLED" }
}

fn log_group_id(task: &TaskSpec, container: &ContainerSpec) -> String {
    format!("{}{}LogGroup", task.id, pascal_case(&container.name))
}

fn synthesize_task(stack: &Stack, template: &mut Template, task: &TaskSpec) -> Result<()> {
    for container in &task.containers {
        if container.log_stream_prefix.is_some() {
            template.add_resource(
                log_group_id(task, container),
                Resource::new("AWS::Logs::LogGroup", json!({})),
            )?;
        }
    }

    let execution_role = if task.has_secrets() {
        let id = format!("{}ExecutionRole", task.id);
        template.add_resource(&id, execution_role(task))?;
        Some(id)
    } else {
        None
    };

    let containers: Vec<Value> = task
        .containers
        .iter()
        .map(|c| container_definition(task, c))
        .collect();
    let volumes: Vec<Value> = task
        .volumes
        .iter()
        .map(|v| json!({ "Name": v.name }))
        .collect();

    let mut properties = json!({
        "Family": family(&stack.name, &task.id),
        "NetworkMode": task.network_mode.as_str(),
        "RequiresCompatibilities": ["EC2"],
        "ContainerDefinitions": containers,
    });
    if !volumes.is_empty() {
        properties["Volumes"] = Value::Array(volumes);
    }
    if let Some(role) = &execution_role {
        properties["ExecutionRoleArn"] = get_att(role, "Arn");
    }

    template.add_resource(
        &task.id,
        Resource::new("AWS::ECS::TaskDefinition", properties),
    )
}

/// Task family: letters, digits, hyphens and underscores only
fn family(stack_name: &str, task_id: &str) -> String {
    format!("{}{}", stack_name, task_id)
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect()
}

fn container_definition(task: &TaskSpec, container: &ContainerSpec) -> Value {
    let mut def = json!({
        "Name": container.name,
        "Image": container.image.to_string(),
        "Essential": container.essential,
    });
    if let Some(memory) = container.memory_mib {
        def["Memory"] = json!(memory);
    }
    if let Some(cpu) = container.cpu {
        def["Cpu"] = json!(cpu);
    }
    if !container.ports.is_empty() {
        def["PortMappings"] = container
            .ports
            .iter()
            .map(|p| {
                json!({
                    "ContainerPort": p.container,
                    "HostPort": p.host,
                    "Protocol": p.protocol.as_str(),
                })
            })
            .collect();
    }
    if !container.environment.is_empty() {
        def["Environment"] = container
            .environment
            .iter()
            .map(|(name, value)| json!({ "Name": name, "Value": value }))
            .collect();
    }
    if !container.secrets.is_empty() {
        def["Secrets"] = container
            .secrets
            .iter()
            .map(|(name, secret)| json!({ "Name": name, "ValueFrom": secret.value_from() }))
            .collect();
    }
    if !container.mounts.is_empty() {
        def["MountPoints"] = container
            .mounts
            .iter()
            .map(|m| {
                json!({
                    "SourceVolume": m.source_volume,
                    "ContainerPath": m.container_path,
                    "ReadOnly": m.read_only,
                })
            })
            .collect();
    }
    if !container.command.is_empty() {
        def["Command"] = json!(container.command);
    }
    if let Some(prefix) = &container.log_stream_prefix {
        def["LogConfiguration"] = json!({
            "LogDriver": "awslogs",
            "Options": {
                "awslogs-group": reference(&log_group_id(task, container)),
                "awslogs-stream-prefix": prefix,
                "awslogs-region": reference(AWS_REGION),
            }
        });
    }
    def
}

/// Role that lets the ECS agent resolve the task's secret references
fn execution_role(task: &TaskSpec) -> Resource {
    let mut grants: BTreeMap<&'static str, Vec<Value>> = BTreeMap::new();
    for secret in task.containers.iter().flat_map(|c| c.secrets.values()) {
        let resources = grants.entry(secret.iam_action()).or_default();
        let arn = secret_arn(secret);
        if !resources.contains(&arn) {
            resources.push(arn);
        }
    }

    let statements: Vec<Value> = grants
        .into_iter()
        .map(|(action, resources)| {
            json!({ "Effect": "Allow", "Action": action, "Resource": resources })
        })
        .collect();

    Resource::new(
        "AWS::IAM::Role",
        json!({
            "AssumeRolePolicyDocument": {
                "Version": POLICY_VERSION,
                "Statement": [{
                    "Effect": "Allow",
                    "Principal": { "Service": "ecs-tasks.amazonaws.com" },
                    "Action": "sts:AssumeRole",
                }]
            },
            "Policies": [{
                "PolicyName": "SecretAccess",
                "PolicyDocument": { "Version": POLICY_VERSION, "Statement": statements },
            }]
        }),
    )
}

fn secret_arn(secret: &SecretRef) -> Value {
    match secret {
        SecretRef::Ssm { parameter } if parameter.starts_with("arn:") => json!(parameter),
        SecretRef::Ssm { parameter } => sub(&format!(
            "arn:${{AWS::Partition}}:ssm:${{AWS::Region}}:${{AWS::AccountId}}:parameter/{}",
            parameter.trim_start_matches('/')
        )),
        SecretRef::SecretsManager { secret, .. } if secret.starts_with("arn:") => json!(secret),
        // by name: the ARN ends in a random six-character suffix
        SecretRef::SecretsManager { secret, .. } => sub(&format!(
            "arn:${{AWS::Partition}}:secretsmanager:${{AWS::Region}}:${{AWS::AccountId}}:secret:{}-??????",
            secret
        )),
    }
}

fn synthesize_service(stack: &Stack, template: &mut Template, service: &EcsService) -> Result<()> {
    let mut properties = json!({
        "Cluster": reference(&service.cluster),
        "TaskDefinition": reference(&service.task),
        "DesiredCount": service.desired_count,
        "DeploymentConfiguration": {
            "MinimumHealthyPercent": service.min_healthy_percent,
            "MaximumPercent": service.max_percent,
        },
        "SchedulingStrategy": "REPLICA",
    });

    let cluster = stack.cluster(&service.cluster);
    let resource = match cluster.and_then(|c| c.capacity_provider.as_ref().map(|cp| (c, cp))) {
        Some((cluster, cp)) => {
            properties["CapacityProviderStrategy"] =
                json!([{ "CapacityProvider": reference(&cp.id), "Weight": 1 }]);
            Resource::new("AWS::ECS::Service", properties).depends_on(associations_id(cluster))
        }
        None => {
            properties["LaunchType"] = json!("EC2");
            Resource::new("AWS::ECS::Service", properties)
        }
    };

    template.add_resource(&service.id, resource)
}
