//! task / service ノードのパース

use super::value::{
    arg, name_arg, parse_enum, prop_bool, prop_int, prop_str, required_bool_arg,
    required_int_arg, required_prop, required_prop_int, required_string_arg, string_args,
};
use crate::error::{Result, StackError};
use crate::model::{
    ContainerSpec, EcsService, ImageRef, MountPoint, NetworkMode, PortMapping, Protocol, TaskSpec,
    Volume,
};
use crate::secret::{SecretRef, is_secret_reference};
use kdl::KdlNode;
use std::collections::BTreeMap;

/// task ノードをパース
pub fn parse_task(node: &KdlNode) -> Result<TaskSpec> {
    let mut task = TaskSpec {
        id: name_arg(node)?,
        network_mode: NetworkMode::Bridge,
        volumes: Vec::new(),
        containers: Vec::new(),
    };

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "network-mode" => {
                    task.network_mode = parse_enum(
                        child,
                        &required_string_arg(child)?,
                        NetworkMode::parse,
                        "bridge, host, awsvpc",
                    )?;
                }
                "volume" => task.volumes.push(Volume {
                    name: name_arg(child)?,
                }),
                "container" => task.containers.push(parse_container(child)?),
                other => tracing::debug!(node = other, "unknown task child, skipped"),
            }
        }
    }

    Ok(task)
}

/// container ノードをパース
///
/// ```kdl
/// container "php-apache-container" {
///     image "public.ecr.aws/docker/library/php:8.2.27-apache"
///     memory 256
///     cpu 384
///     env {
///         DB_HOST "mysql-container"
///     }
///     secrets {
///         DB_PASSWORD "ssm:/lamp/mysql/password"
///     }
///     port container=80 host=8080
///     mount "html-data" path="/var/www/html"
///     command "/bin/sh" "-c" "apache2-foreground"
///     logging stream-prefix="php-apache"
/// }
/// ```
fn parse_container(node: &KdlNode) -> Result<ContainerSpec> {
    let name = name_arg(node)?;
    let mut image = None;
    let mut container = ContainerSpec::new(name.clone(), ImageRef::new("", ""));

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "image" => image = Some(ImageRef::parse(&required_string_arg(child)?)),
                "memory" => container.memory_mib = Some(required_int_arg(child)?),
                "cpu" => container.cpu = Some(required_int_arg(child)?),
                "env" | "environment" => {
                    for (key, value) in parse_string_map(child) {
                        if is_secret_reference(&value) {
                            tracing::warn!(
                                container = %name,
                                key = %key,
                                "'{value}' is passed as a plain environment value. Hint: move it into the 'secrets' block"
                            );
                        }
                        container.environment.insert(key, value);
                    }
                }
                "secrets" => {
                    for (key, reference) in parse_string_map(child) {
                        container.secrets.insert(key, SecretRef::parse(&reference)?);
                    }
                }
                "port" => container.ports.push(parse_port(child)?),
                "mount" => container.mounts.push(MountPoint {
                    source_volume: name_arg(child)?,
                    container_path: required_prop(child, "path")?,
                    read_only: prop_bool(child, "read-only")?.unwrap_or(false),
                }),
                "command" => container.command = string_args(child),
                "logging" => {
                    container.log_stream_prefix =
                        prop_str(child, "stream-prefix").map(|s| s.to_string());
                }
                "essential" => container.essential = required_bool_arg(child)?,
                other => tracing::debug!(node = other, "unknown container child, skipped"),
            }
        }
    }

    container.image = image.ok_or_else(|| StackError::MissingField {
        node: format!("container \"{}\"", name),
        field: "image".to_string(),
    })?;

    Ok(container)
}

/// `KEY "value"` 形式の子ノードを読み取る
fn parse_string_map(node: &KdlNode) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    if let Some(children) = node.children() {
        for var in children.nodes() {
            let key = var.name().value().to_string();
            let value = arg(var, 0)
                .map(|v| match v.as_string() {
                    Some(s) => s.to_string(),
                    // 数値などはそのまま文字列化
                    None => v.to_string(),
                })
                .unwrap_or_default();
            map.insert(key, value);
        }
    }
    map
}

/// port ノードをパース
///
/// host を省略した場合はコンテナポートと同じ番号を使う
fn parse_port(node: &KdlNode) -> Result<PortMapping> {
    let container = required_prop_int(node, "container")?;
    let host = prop_int(node, "host")?.unwrap_or(container);
    let protocol = match prop_str(node, "protocol") {
        Some(p) => parse_enum(node, p, Protocol::parse, "tcp, udp")?,
        None => Protocol::Tcp,
    };

    Ok(PortMapping {
        container,
        host,
        protocol,
    })
}

/// service ノードをパース
///
/// ```kdl
/// service "LampService" cluster="LampCluster" task="LampTaskDef" {
///     desired-count 1
/// }
/// ```
pub fn parse_service(node: &KdlNode) -> Result<EcsService> {
    let mut service = EcsService::new(
        name_arg(node)?,
        required_prop(node, "cluster")?,
        required_prop(node, "task")?,
    );

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "desired-count" => service.desired_count = required_int_arg(child)?,
                "min-healthy-percent" => service.min_healthy_percent = required_int_arg(child)?,
                "max-percent" => service.max_percent = required_int_arg(child)?,
                other => tracing::debug!(node = other, "unknown service child, skipped"),
            }
        }
    }

    Ok(service)
}
