//! role / compute / cluster ノードのパース

use super::value::{
    name_arg, parse_enum, prop_bool, prop_int, required_prop, required_string_arg,
};
use crate::error::{Result, StackError};
use crate::model::{
    Capacity, CapacityProvider, Cluster, ComputePool, ExternalRole, InstanceType, MachineImage,
    SubnetSelection,
};
use kdl::KdlNode;

/// role ノードをパース
///
/// ```kdl
/// role "ExistingEcsRole" arn="arn:aws:iam::735125878431:role/ecsInstanceRole"
/// ```
pub fn parse_role(node: &KdlNode) -> Result<ExternalRole> {
    Ok(ExternalRole {
        id: name_arg(node)?,
        arn: required_prop(node, "arn")?,
    })
}

/// compute ノードをパース
pub fn parse_compute(node: &KdlNode) -> Result<ComputePool> {
    let id = name_arg(node)?;

    let mut instance_type = None;
    let mut machine_image = MachineImage::EcsAmazonLinux2023;
    let mut capacity = Capacity::default();
    let mut subnets = SubnetSelection::Private;
    let mut role = None;
    let mut security_group = None;

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "instance-type" => {
                    let raw = required_string_arg(child)?;
                    instance_type = Some(parse_enum(
                        child,
                        &raw,
                        InstanceType::parse,
                        "t2.small のような <class>.<size> 形式",
                    )?);
                }
                "machine-image" => {
                    machine_image = MachineImage::parse(&required_string_arg(child)?);
                }
                "capacity" => {
                    // 省略した項目は既定値のまま
                    if let Some(min) = prop_int(child, "min")? {
                        capacity.min = min;
                    }
                    if let Some(max) = prop_int(child, "max")? {
                        capacity.max = max;
                    }
                    if let Some(desired) = prop_int(child, "desired")? {
                        capacity.desired = desired;
                    }
                }
                "subnets" => {
                    subnets = parse_enum(
                        child,
                        &required_string_arg(child)?,
                        SubnetSelection::parse,
                        "public, private",
                    )?;
                }
                "role" => role = Some(required_string_arg(child)?),
                "security-group" => security_group = Some(required_string_arg(child)?),
                other => tracing::debug!(node = other, "unknown compute child, skipped"),
            }
        }
    }

    let missing = |field: &str| StackError::MissingField {
        node: format!("compute \"{}\"", id),
        field: field.to_string(),
    };

    Ok(ComputePool {
        instance_type: instance_type.ok_or_else(|| missing("instance-type"))?,
        role: role.ok_or_else(|| missing("role"))?,
        security_group: security_group.ok_or_else(|| missing("security-group"))?,
        machine_image,
        capacity,
        subnets,
        id,
    })
}

/// cluster ノードをパース
///
/// ```kdl
/// cluster "LampCluster" {
///     capacity-provider "EcsCapacityProvider" compute="EcsAutoScalingGroup"
/// }
/// ```
pub fn parse_cluster(node: &KdlNode) -> Result<Cluster> {
    let mut cluster = Cluster {
        id: name_arg(node)?,
        capacity_provider: None,
    };

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "capacity-provider" => {
                    let mut cp =
                        CapacityProvider::for_compute(name_arg(child)?, required_prop(child, "compute")?);
                    if let Some(v) = prop_bool(child, "managed-scaling")? {
                        cp.managed_scaling = v;
                    }
                    if let Some(v) = prop_int(child, "target-capacity")? {
                        cp.target_capacity = v;
                    }
                    if let Some(v) = prop_bool(child, "managed-termination-protection")? {
                        cp.managed_termination_protection = v;
                    }
                    cluster.capacity_provider = Some(cp);
                }
                other => tracing::debug!(node = other, "unknown cluster child, skipped"),
            }
        }
    }

    Ok(cluster)
}
