//! KDLパーサー
//!
//! lampstackのKDLスタック定義をパースします。
//! 各ノードタイプのパース処理はモジュールに分離されています。

mod compute;
mod dns;
mod load_balancer;
mod network;
mod security;
mod task;
mod value;

use compute::{parse_cluster, parse_compute, parse_role};
use dns::{parse_alias_record, parse_hosted_zone, parse_output};
use load_balancer::parse_load_balancer;
use network::{parse_environment, parse_network};
use security::parse_security_group;
use task::{parse_service, parse_task};
use value::{string_arg, upsert};

use crate::error::Result;
use crate::model::Stack;
use kdl::KdlDocument;
use std::fs;
use std::path::Path;
use tracing::debug;

/// KDLファイルをパースしてStackを生成
pub fn parse_kdl_file<P: AsRef<Path>>(path: P) -> Result<Stack> {
    let content = fs::read_to_string(path.as_ref())?;
    let name = path
        .as_ref()
        .parent()
        .and_then(|p| p.file_name())
        .and_then(|n| n.to_str())
        .unwrap_or("unnamed")
        .to_string();
    parse_kdl_string(&content, name)
}

/// KDL文字列をパース
///
/// 同じ論理IDのノードが複数回現れた場合は後の宣言で置き換える。
/// ステージ別ファイルを連結してパースすることで上書きが実現される。
pub fn parse_kdl_string(content: &str, default_name: String) -> Result<Stack> {
    let doc: KdlDocument = content.parse()?;
    let mut stack = Stack::new(default_name);

    for node in doc.nodes() {
        match node.name().value() {
            "stack" => {
                if let Some(name) = string_arg(node, 0) {
                    stack.name = name.to_string();
                }
                if let Some(children) = node.children() {
                    for child in children.nodes() {
                        if child.name().value() == "description" {
                            stack.description = string_arg(child, 0).map(|s| s.to_string());
                        }
                    }
                }
            }
            "environment" => stack.environment = parse_environment(node),
            "network" => stack.network = parse_network(node)?,
            "security-group" => {
                upsert(&mut stack.security_groups, parse_security_group(node)?, |x| x.id.as_str())
            }
            "role" => upsert(&mut stack.roles, parse_role(node)?, |x| x.id.as_str()),
            "compute" => upsert(&mut stack.compute, parse_compute(node)?, |x| x.id.as_str()),
            "cluster" => upsert(&mut stack.clusters, parse_cluster(node)?, |x| x.id.as_str()),
            "task" => upsert(&mut stack.tasks, parse_task(node)?, |x| x.id.as_str()),
            "service" => upsert(&mut stack.services, parse_service(node)?, |x| x.id.as_str()),
            "load-balancer" => {
                upsert(&mut stack.load_balancers, parse_load_balancer(node)?, |x| x.id.as_str())
            }
            "hosted-zone" => upsert(&mut stack.hosted_zones, parse_hosted_zone(node)?, |x| x.id.as_str()),
            "alias-record" => upsert(&mut stack.records, parse_alias_record(node)?, |x| x.id.as_str()),
            "output" => upsert(&mut stack.outputs, parse_output(node)?, |x| x.id.as_str()),
            "variables" => {
                // テンプレート展開時に処理済み
            }
            other => debug!(node = other, "unknown top-level node, skipped"),
        }
    }

    Ok(stack)
}
