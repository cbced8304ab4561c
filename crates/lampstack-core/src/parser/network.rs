//! environment / network ノードのパース

use super::value::{prop_str, required_string_arg, string_args};
use crate::error::Result;
use crate::model::{Environment, Network};
use kdl::KdlNode;

/// environment ノードをパース
///
/// ```kdl
/// environment account="735125878431" region="ap-northeast-1"
/// ```
pub fn parse_environment(node: &KdlNode) -> Environment {
    Environment {
        account: prop_str(node, "account").map(|s| s.to_string()),
        region: prop_str(node, "region").map(|s| s.to_string()),
    }
}

/// network ノードをパース
///
/// ```kdl
/// network {
///     vpc "vpc-02b5eb5d25b928589"
///     public-subnets "subnet-a" "subnet-c"
///     private-subnets "subnet-b" "subnet-d"
/// }
/// ```
pub fn parse_network(node: &KdlNode) -> Result<Network> {
    let mut network = Network::default();

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "vpc" | "vpc-id" => network.vpc_id = required_string_arg(child)?,
                "public-subnets" => network.public_subnets = string_args(child),
                "private-subnets" => network.private_subnets = string_args(child),
                other => tracing::debug!(node = other, "unknown network child, skipped"),
            }
        }
    }

    Ok(network)
}
