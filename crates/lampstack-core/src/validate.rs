//! スタック定義の検証
//!
//! パース済みの [`Stack`] に対して参照整合性と不変条件をチェックします。
//! 最初のエラーで止めず、見つかった問題をすべて返します。

use crate::error::{Result, StackError};
use crate::model::{
    AliasTarget, Condition, OutputValue, Peer, ResourceKind, Stack, TaskSpec,
};
use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::{debug, instrument};

/// リスナールールの優先度の上限 (ALB)
pub const MAX_RULE_PRIORITY: u32 = 50_000;

/// ヘルスチェック間隔の範囲（秒）
pub const HEALTH_CHECK_INTERVAL_RANGE: std::ops::RangeInclusive<u32> = 5..=300;

/// 検証で見つかった問題
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    /// 論理IDの重複
    DuplicateId { id: String, kinds: Vec<&'static str> },
    /// 存在しないリソースへの参照
    UnknownReference {
        from: String,
        kind: &'static str,
        id: String,
    },
    /// 同一タスク内でホストポートが衝突
    HostPortCollision {
        task: String,
        port: u16,
        containers: Vec<String>,
    },
    /// 同一リスナー内で優先度が重複
    DuplicatePriority {
        listener: String,
        priority: u32,
        rules: Vec<String>,
    },
    /// 値の範囲外
    OutOfRange { at: String, message: String },
    /// 必須項目が空
    Missing { at: String, field: &'static str },
    /// その他の整合性の問題
    Inconsistent { at: String, message: String },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateId { id, kinds } => {
                write!(f, "論理ID '{}' が重複しています ({})", id, kinds.join(", "))
            }
            Self::UnknownReference { from, kind, id } => {
                write!(f, "{}: {} '{}' が定義されていません", from, kind, id)
            }
            Self::HostPortCollision {
                task,
                port,
                containers,
            } => write!(
                f,
                "タスク '{}': ホストポート {} が複数のコンテナで使われています ({})",
                task,
                port,
                containers.join(", ")
            ),
            Self::DuplicatePriority {
                listener,
                priority,
                rules,
            } => write!(
                f,
                "リスナー '{}': 優先度 {} が重複しています ({})",
                listener,
                priority,
                rules.join(", ")
            ),
            Self::OutOfRange { at, message } => write!(f, "{}: {}", at, message),
            Self::Missing { at, field } => write!(f, "{}: '{}' が指定されていません", at, field),
            Self::Inconsistent { at, message } => write!(f, "{}: {}", at, message),
        }
    }
}

/// スタック定義を検証
#[instrument(skip(stack), fields(stack = %stack.name))]
pub fn validate(stack: &Stack) -> Result<()> {
    let issues = collect_issues(stack);
    if issues.is_empty() {
        debug!("Stack validation passed");
        Ok(())
    } else {
        debug!(issue_count = issues.len(), "Stack validation failed");
        Err(StackError::Invalid(issues))
    }
}

/// 見つかった問題をすべて返す
pub fn collect_issues(stack: &Stack) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    check_unique_ids(stack, &mut issues);
    check_network(stack, &mut issues);
    check_security_groups(stack, &mut issues);
    check_compute(stack, &mut issues);
    check_clusters(stack, &mut issues);
    for task in &stack.tasks {
        check_task(task, &mut issues);
    }
    check_services(stack, &mut issues);
    check_load_balancers(stack, &mut issues);
    check_dns(stack, &mut issues);
    check_outputs(stack, &mut issues);

    issues
}

fn unknown(from: &str, kind: ResourceKind, id: &str) -> ValidationIssue {
    ValidationIssue::UnknownReference {
        from: from.to_string(),
        kind: kind.as_str(),
        id: id.to_string(),
    }
}

fn check_unique_ids(stack: &Stack, issues: &mut Vec<ValidationIssue>) {
    let mut seen: HashMap<&str, Vec<&'static str>> = HashMap::new();
    let mut order = Vec::new();
    for (kind, id) in stack.logical_ids() {
        let kinds = seen.entry(id).or_default();
        if kinds.is_empty() {
            order.push(id);
        }
        kinds.push(kind.as_str());
    }
    for id in order {
        let kinds = &seen[id];
        if kinds.len() > 1 {
            issues.push(ValidationIssue::DuplicateId {
                id: id.to_string(),
                kinds: kinds.clone(),
            });
        }
    }
}

fn check_network(stack: &Stack, issues: &mut Vec<ValidationIssue>) {
    if stack.network.vpc_id.is_empty() {
        issues.push(ValidationIssue::Missing {
            at: "network".to_string(),
            field: "vpc",
        });
    }
}

fn check_security_groups(stack: &Stack, issues: &mut Vec<ValidationIssue>) {
    for sg in &stack.security_groups {
        for rule in &sg.ingress {
            if let Peer::SecurityGroup(source) = &rule.peer
                && stack.security_group(source).is_none()
            {
                issues.push(unknown(&sg.id, ResourceKind::SecurityGroup, source));
            }
        }
    }
}

fn check_compute(stack: &Stack, issues: &mut Vec<ValidationIssue>) {
    for pool in &stack.compute {
        match stack.role(&pool.role) {
            None => issues.push(unknown(&pool.id, ResourceKind::Role, &pool.role)),
            Some(role) if role.role_name().is_none() => {
                issues.push(ValidationIssue::Inconsistent {
                    at: role.id.clone(),
                    message: format!("IAMロールのARNではありません: {}", role.arn),
                })
            }
            Some(_) => {}
        }
        if stack.security_group(&pool.security_group).is_none() {
            issues.push(unknown(
                &pool.id,
                ResourceKind::SecurityGroup,
                &pool.security_group,
            ));
        }

        let cap = pool.capacity;
        if cap.max == 0 {
            issues.push(ValidationIssue::OutOfRange {
                at: pool.id.clone(),
                message: "max は1以上である必要があります".to_string(),
            });
        }
        if !(cap.min <= cap.desired && cap.desired <= cap.max) {
            issues.push(ValidationIssue::OutOfRange {
                at: pool.id.clone(),
                message: format!(
                    "min <= desired <= max を満たしていません (min={}, desired={}, max={})",
                    cap.min, cap.desired, cap.max
                ),
            });
        }
    }
}

fn check_clusters(stack: &Stack, issues: &mut Vec<ValidationIssue>) {
    let mut bound: HashMap<&str, &str> = HashMap::new();
    for cluster in &stack.clusters {
        let Some(cp) = &cluster.capacity_provider else {
            continue;
        };
        if stack.compute_pool(&cp.compute).is_none() {
            issues.push(unknown(&cp.id, ResourceKind::Compute, &cp.compute));
        }
        if !(1..=100).contains(&cp.target_capacity) {
            issues.push(ValidationIssue::OutOfRange {
                at: cp.id.clone(),
                message: format!(
                    "target-capacity は1〜100である必要があります: {}",
                    cp.target_capacity
                ),
            });
        }
        if let Some(other) = bound.insert(cp.compute.as_str(), cp.id.as_str()) {
            issues.push(ValidationIssue::Inconsistent {
                at: cp.id.clone(),
                message: format!(
                    "compute '{}' は既に '{}' に割り当てられています",
                    cp.compute, other
                ),
            });
        }
    }
}

fn check_task(task: &TaskSpec, issues: &mut Vec<ValidationIssue>) {
    if task.containers.is_empty() {
        issues.push(ValidationIssue::Missing {
            at: task.id.clone(),
            field: "container",
        });
    }

    let volumes: HashSet<&str> = task.volumes.iter().map(|v| v.name.as_str()).collect();
    let mut names = HashSet::new();
    let mut host_ports: Vec<(u16, Vec<String>)> = Vec::new();

    for container in &task.containers {
        let at = format!("{}/{}", task.id, container.name);
        if !names.insert(container.name.as_str()) {
            issues.push(ValidationIssue::Inconsistent {
                at: task.id.clone(),
                message: format!("コンテナ名 '{}' が重複しています", container.name),
            });
        }
        if container.memory_mib == Some(0) {
            issues.push(ValidationIssue::OutOfRange {
                at: at.clone(),
                message: "memory は1以上である必要があります".to_string(),
            });
        }
        for key in container.secrets.keys() {
            if container.environment.contains_key(key) {
                issues.push(ValidationIssue::Inconsistent {
                    at: at.clone(),
                    message: format!("'{}' が environment と secret の両方に定義されています", key),
                });
            }
        }
        for mount in &container.mounts {
            if !volumes.contains(mount.source_volume.as_str()) {
                issues.push(ValidationIssue::UnknownReference {
                    from: at.clone(),
                    kind: "volume",
                    id: mount.source_volume.clone(),
                });
            }
        }
        // ホストポート 0 は動的割り当てなので衝突しない
        for port in container.ports.iter().filter(|p| p.host != 0) {
            match host_ports.iter_mut().find(|(p, _)| *p == port.host) {
                Some((_, users)) => users.push(container.name.clone()),
                None => host_ports.push((port.host, vec![container.name.clone()])),
            }
        }
    }

    for (port, containers) in host_ports {
        if containers.len() > 1 {
            issues.push(ValidationIssue::HostPortCollision {
                task: task.id.clone(),
                port,
                containers,
            });
        }
    }
}

fn check_services(stack: &Stack, issues: &mut Vec<ValidationIssue>) {
    for service in &stack.services {
        if stack.cluster(&service.cluster).is_none() {
            issues.push(unknown(&service.id, ResourceKind::Cluster, &service.cluster));
        }
        if stack.task(&service.task).is_none() {
            issues.push(unknown(&service.id, ResourceKind::Task, &service.task));
        }
        if service.min_healthy_percent > service.max_percent {
            issues.push(ValidationIssue::OutOfRange {
                at: service.id.clone(),
                message: format!(
                    "min-healthy-percent ({}) が max-percent ({}) を超えています",
                    service.min_healthy_percent, service.max_percent
                ),
            });
        }
    }
}

fn check_load_balancers(stack: &Stack, issues: &mut Vec<ValidationIssue>) {
    for lb in &stack.load_balancers {
        if stack.security_group(&lb.security_group).is_none() {
            issues.push(unknown(&lb.id, ResourceKind::SecurityGroup, &lb.security_group));
        }

        for tg in &lb.target_groups {
            let interval = tg.health_check.interval_secs;
            if !HEALTH_CHECK_INTERVAL_RANGE.contains(&interval) {
                issues.push(ValidationIssue::OutOfRange {
                    at: tg.id.clone(),
                    message: format!("ヘルスチェック間隔は5〜300秒である必要があります: {}", interval),
                });
            }
            if let Some(timeout) = tg.health_check.timeout_secs
                && timeout >= interval
            {
                issues.push(ValidationIssue::OutOfRange {
                    at: tg.id.clone(),
                    message: format!(
                        "ヘルスチェックのタイムアウト ({}) は間隔 ({}) より短くする必要があります",
                        timeout, interval
                    ),
                });
            }
            if !tg.health_check.path.starts_with('/') {
                issues.push(ValidationIssue::Inconsistent {
                    at: tg.id.clone(),
                    message: format!(
                        "ヘルスチェックのパスは '/' で始まる必要があります: {}",
                        tg.health_check.path
                    ),
                });
            }
            for target in &tg.targets {
                if stack.compute_pool(target).is_none() {
                    issues.push(unknown(&tg.id, ResourceKind::Compute, target));
                }
            }
        }

        for listener in &lb.listeners {
            if lb.target_group(&listener.default_target_group).is_none() {
                issues.push(unknown(
                    &listener.id,
                    ResourceKind::TargetGroup,
                    &listener.default_target_group,
                ));
            }

            let mut priorities: Vec<(u32, Vec<String>)> = Vec::new();
            for rule in &listener.rules {
                if !(1..=MAX_RULE_PRIORITY).contains(&rule.priority) {
                    issues.push(ValidationIssue::OutOfRange {
                        at: rule.id.clone(),
                        message: format!(
                            "優先度は1〜{}である必要があります: {}",
                            MAX_RULE_PRIORITY, rule.priority
                        ),
                    });
                }
                if lb.target_group(&rule.forward).is_none() {
                    issues.push(unknown(&rule.id, ResourceKind::TargetGroup, &rule.forward));
                }
                let empty_condition = rule.conditions.iter().any(|c| match c {
                    Condition::HostHeader(values) | Condition::PathPattern(values) => {
                        values.is_empty()
                    }
                });
                if rule.conditions.is_empty() || empty_condition {
                    issues.push(ValidationIssue::Missing {
                        at: rule.id.clone(),
                        field: "condition",
                    });
                }
                match priorities.iter_mut().find(|(p, _)| *p == rule.priority) {
                    Some((_, rules)) => rules.push(rule.id.clone()),
                    None => priorities.push((rule.priority, vec![rule.id.clone()])),
                }
            }
            for (priority, rules) in priorities {
                if rules.len() > 1 {
                    issues.push(ValidationIssue::DuplicatePriority {
                        listener: listener.id.clone(),
                        priority,
                        rules,
                    });
                }
            }
        }
    }
}

fn check_dns(stack: &Stack, issues: &mut Vec<ValidationIssue>) {
    for record in &stack.records {
        match stack.hosted_zone(&record.zone) {
            None => issues.push(unknown(&record.id, ResourceKind::HostedZone, &record.zone)),
            Some(zone) if !record.is_within(&zone.zone_name) => {
                issues.push(ValidationIssue::Inconsistent {
                    at: record.id.clone(),
                    message: format!(
                        "レコード '{}' はゾーン '{}' の配下にありません",
                        record.record_name, zone.zone_name
                    ),
                })
            }
            Some(_) => {}
        }
        let AliasTarget::LoadBalancer(lb) = &record.target;
        if stack.load_balancer(lb).is_none() {
            issues.push(unknown(&record.id, ResourceKind::LoadBalancer, lb));
        }
    }
}

fn check_outputs(stack: &Stack, issues: &mut Vec<ValidationIssue>) {
    for output in &stack.outputs {
        let OutputValue::LoadBalancerDnsName(lb) = &output.value;
        if stack.load_balancer(lb).is_none() {
            issues.push(unknown(&output.id, ResourceKind::LoadBalancer, lb));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blueprint::{LampOptions, lamp_stack};
    use crate::model::{ListenerRule, PortMapping};

    fn lamp() -> Stack {
        lamp_stack(&LampOptions::default())
    }

    #[test]
    fn test_blueprint_is_valid() {
        assert!(validate(&lamp()).is_ok());
    }

    #[test]
    fn test_host_port_collision() {
        let mut stack = lamp();
        // phpmyadmin と同じホストポートを php-apache に割り当てる
        stack.tasks[0].containers[2].ports = vec![PortMapping::tcp(80, 8888)];

        let issues = collect_issues(&stack);
        assert!(issues.iter().any(|i| matches!(
            i,
            ValidationIssue::HostPortCollision { port: 8888, containers, .. }
                if containers == &vec!["phpmyadmin-container".to_string(), "php-apache-container".to_string()]
        )));
    }

    #[test]
    fn test_dynamic_host_ports_do_not_collide() {
        let mut stack = lamp();
        stack.tasks[0].containers[1].ports = vec![PortMapping::tcp(80, 0)];
        stack.tasks[0].containers[2].ports = vec![PortMapping::tcp(80, 0)];

        let issues = collect_issues(&stack);
        assert!(
            !issues
                .iter()
                .any(|i| matches!(i, ValidationIssue::HostPortCollision { .. })),
            "{issues:?}"
        );
    }

    #[test]
    fn test_duplicate_rule_priority() {
        let mut stack = lamp();
        let listener = &mut stack.load_balancers[0].listeners[0];
        let mut second = listener.rules[0].clone();
        second.id = "SecondRule".to_string();
        listener.rules.push(second);

        let issues = collect_issues(&stack);
        assert!(issues.iter().any(|i| matches!(
            i,
            ValidationIssue::DuplicatePriority { priority: 1, rules, .. } if rules.len() == 2
        )));
    }

    #[test]
    fn test_priority_out_of_range() {
        let mut stack = lamp();
        stack.load_balancers[0].listeners[0].rules[0].priority = 0;
        let issues = collect_issues(&stack);
        assert!(issues.iter().any(|i| matches!(i, ValidationIssue::OutOfRange { .. })));
    }

    #[test]
    fn test_unknown_references() {
        let mut stack = lamp();
        stack.compute[0].security_group = "NoSuchGroup".to_string();
        stack.load_balancers[0].listeners[0].rules[0].forward = "NoSuchTG".to_string();

        let issues = collect_issues(&stack);
        assert!(issues.contains(&ValidationIssue::UnknownReference {
            from: "EcsAutoScalingGroup".to_string(),
            kind: "security-group",
            id: "NoSuchGroup".to_string(),
        }));
        assert!(issues.contains(&ValidationIssue::UnknownReference {
            from: "PhpMyAdminRule".to_string(),
            kind: "target-group",
            id: "NoSuchTG".to_string(),
        }));
    }

    #[test]
    fn test_duplicate_logical_id() {
        let mut stack = lamp();
        stack.clusters[0].id = "LampALB".to_string();
        stack.services[0].cluster = "LampALB".to_string();

        let issues = collect_issues(&stack);
        assert!(issues.contains(&ValidationIssue::DuplicateId {
            id: "LampALB".to_string(),
            kinds: vec!["cluster", "load-balancer"],
        }));
    }

    #[test]
    fn test_capacity_bounds() {
        let mut stack = lamp();
        stack.compute[0].capacity.desired = 5;
        let err = validate(&stack).unwrap_err();
        assert!(err.to_string().contains("min <= desired <= max"));
    }

    #[test]
    fn test_mount_requires_volume() {
        let mut stack = lamp();
        stack.tasks[0].volumes.clear();
        let issues = collect_issues(&stack);
        assert!(issues.iter().any(|i| matches!(
            i,
            ValidationIssue::UnknownReference { kind: "volume", id, .. } if id == "html-data"
        )));
    }

    #[test]
    fn test_record_outside_zone() {
        let mut stack = lamp();
        stack.records[0].record_name = "*.lamp.example.org".to_string();
        let issues = collect_issues(&stack);
        assert!(issues.iter().any(|i| matches!(i, ValidationIssue::Inconsistent { .. })));
    }

    #[test]
    fn test_rule_without_condition() {
        let mut stack = lamp();
        stack.load_balancers[0].listeners[0].rules = vec![ListenerRule {
            id: "Empty".to_string(),
            priority: 2,
            conditions: vec![],
            forward: "LampTarget".to_string(),
        }];
        let issues = collect_issues(&stack);
        assert!(issues.contains(&ValidationIssue::Missing {
            at: "Empty".to_string(),
            field: "condition",
        }));
    }

    #[test]
    fn test_all_issues_reported_at_once() {
        let mut stack = lamp();
        stack.network.vpc_id.clear();
        stack.compute[0].capacity.max = 0;
        stack.load_balancers[0].target_groups[0].health_check.interval_secs = 1;

        match validate(&stack) {
            Err(StackError::Invalid(issues)) => assert!(issues.len() >= 3),
            other => panic!("Expected Invalid error, got {:?}", other),
        }
    }
}
