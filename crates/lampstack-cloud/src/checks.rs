//! Property checks on a rendered template
//!
//! These run on the template rather than on the stack, so they also catch
//! mistakes introduced by synthesis itself or by hand-edited templates.

use crate::intrinsic::{is_pseudo_parameter, references};
use crate::template::{Resource, Template};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::{debug, instrument};

const LISTENER: &str = "AWS::ElasticLoadBalancingV2::Listener";
const LISTENER_RULE: &str = "AWS::ElasticLoadBalancingV2::ListenerRule";
const LOAD_BALANCER: &str = "AWS::ElasticLoadBalancingV2::LoadBalancer";
const TASK_DEFINITION: &str = "AWS::ECS::TaskDefinition";
const RECORD_SET: &str = "AWS::Route53::RecordSet";
const INSTANCE_PROFILE: &str = "AWS::IAM::InstanceProfile";

/// Resource types this tool only ever references
pub const EXTERNAL_RESOURCE_TYPES: [&str; 3] = [
    "AWS::EC2::VPC",
    "AWS::EC2::Subnet",
    "AWS::Route53::HostedZone",
];

/// Parameter types that name an existing resource
pub const EXTERNAL_PARAMETER_TYPES: [&str; 3] = [
    "AWS::EC2::VPC::Id",
    "List<AWS::EC2::Subnet::Id>",
    "AWS::Route53::HostedZone::Id",
];

/// A property the template does not satisfy
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Violation {
    /// Two rules on one listener share a priority
    DuplicatePriority {
        listener: String,
        priority: u64,
        rules: Vec<String>,
    },
    /// Two containers of one task definition bind the same host port
    HostPortCollision {
        task: String,
        port: u64,
        containers: Vec<String>,
    },
    /// Alias record whose load balancer has no listener
    UnattachedAlias {
        record: String,
        load_balancer: Option<String>,
    },
    /// An existing resource is created instead of referenced
    ExternalResourceCreated { id: String, resource_type: String },
    /// Instance profile role that is not an input parameter
    InstanceRoleNotExternal { profile: String, role: String },
    /// The same existing resource is declared by more than one parameter
    DuplicateExternalParameter {
        parameter_type: String,
        parameters: Vec<String>,
    },
    /// Reference to a name that is neither a resource nor a parameter
    UnresolvedReference { from: String, name: String },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicatePriority {
                listener,
                priority,
                rules,
            } => write!(
                f,
                "listener {}: priority {} is used by {}",
                listener,
                priority,
                rules.join(", ")
            ),
            Self::HostPortCollision {
                task,
                port,
                containers,
            } => write!(
                f,
                "task definition {}: host port {} is bound by {}",
                task,
                port,
                containers.join(", ")
            ),
            Self::UnattachedAlias {
                record,
                load_balancer: Some(lb),
            } => write!(
                f,
                "alias record {}: load balancer {} has no listener",
                record, lb
            ),
            Self::UnattachedAlias {
                record,
                load_balancer: None,
            } => write!(f, "alias record {}: target is not a load balancer", record),
            Self::ExternalResourceCreated { id, resource_type } => write!(
                f,
                "{} creates a {} that should be referenced by parameter",
                id, resource_type
            ),
            Self::InstanceRoleNotExternal { profile, role } => write!(
                f,
                "instance profile {}: role {} is not an input parameter",
                profile, role
            ),
            Self::DuplicateExternalParameter {
                parameter_type,
                parameters,
            } => write!(
                f,
                "parameters {} declare the same {}",
                parameters.join(", "),
                parameter_type
            ),
            Self::UnresolvedReference { from, name } => {
                write!(f, "{} references unknown name {}", from, name)
            }
        }
    }
}

/// Run every check and return all violations
#[instrument(skip(template))]
pub fn verify(template: &Template) -> Vec<Violation> {
    let mut violations = Vec::new();

    check_rule_priorities(template, &mut violations);
    check_host_ports(template, &mut violations);
    check_alias_targets(template, &mut violations);
    check_external_resources(template, &mut violations);
    check_references(template, &mut violations);

    debug!(violations = violations.len(), "Template checks finished");
    violations
}

/// The logical id a `{"Ref": id}` value points at
fn ref_target(value: Option<&Value>) -> Option<&str> {
    value?.get("Ref")?.as_str()
}

fn check_rule_priorities(template: &Template, violations: &mut Vec<Violation>) {
    let mut by_listener: BTreeMap<&str, BTreeMap<u64, Vec<String>>> = BTreeMap::new();
    for (id, rule) in template.resources_of_type(LISTENER_RULE) {
        let Some(listener) = ref_target(rule.property("ListenerArn")) else {
            continue;
        };
        let Some(priority) = rule.property("Priority").and_then(Value::as_u64) else {
            continue;
        };
        by_listener
            .entry(listener)
            .or_default()
            .entry(priority)
            .or_default()
            .push(id.clone());
    }

    for (listener, priorities) in by_listener {
        for (priority, rules) in priorities {
            if rules.len() > 1 {
                violations.push(Violation::DuplicatePriority {
                    listener: listener.to_string(),
                    priority,
                    rules,
                });
            }
        }
    }
}

fn check_host_ports(template: &Template, violations: &mut Vec<Violation>) {
    for (id, task) in template.resources_of_type(TASK_DEFINITION) {
        let mut ports: BTreeMap<u64, Vec<String>> = BTreeMap::new();
        let containers = task
            .property("ContainerDefinitions")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        for container in containers {
            let name = container
                .get("Name")
                .and_then(Value::as_str)
                .unwrap_or_default();
            let mappings = container
                .get("PortMappings")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default();
            for mapping in mappings {
                // an omitted host port means the container port
                let host = mapping
                    .get("HostPort")
                    .or_else(|| mapping.get("ContainerPort"))
                    .and_then(Value::as_u64);
                if let Some(port) = host.filter(|p| *p != 0) {
                    ports.entry(port).or_default().push(name.to_string());
                }
            }
        }

        for (port, containers) in ports {
            if containers.len() > 1 {
                violations.push(Violation::HostPortCollision {
                    task: id.clone(),
                    port,
                    containers,
                });
            }
        }
    }
}

fn alias_load_balancer<'a>(template: &'a Template, record: &Resource) -> Option<&'a str> {
    let alias = record.property("AliasTarget")?;
    references(alias).into_iter().find_map(|name| {
        template
            .resources
            .get_key_value(&name)
            .filter(|(_, r)| r.resource_type == LOAD_BALANCER)
            .map(|(id, _)| id.as_str())
    })
}

fn check_alias_targets(template: &Template, violations: &mut Vec<Violation>) {
    let attached: BTreeSet<&str> = template
        .resources_of_type(LISTENER)
        .filter_map(|(_, listener)| ref_target(listener.property("LoadBalancerArn")))
        .collect();

    for (id, record) in template.resources_of_type(RECORD_SET) {
        if record.property("AliasTarget").is_none() {
            continue;
        }
        match alias_load_balancer(template, record) {
            Some(lb) if attached.contains(lb) => {}
            lb => violations.push(Violation::UnattachedAlias {
                record: id.clone(),
                load_balancer: lb.map(str::to_string),
            }),
        }
    }
}

fn check_external_resources(template: &Template, violations: &mut Vec<Violation>) {
    for (id, resource) in &template.resources {
        if EXTERNAL_RESOURCE_TYPES.contains(&resource.resource_type.as_str()) {
            violations.push(Violation::ExternalResourceCreated {
                id: id.clone(),
                resource_type: resource.resource_type.clone(),
            });
        }
    }

    for (id, profile) in template.resources_of_type(INSTANCE_PROFILE) {
        let roles = profile
            .property("Roles")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        for role in roles {
            match ref_target(Some(role)) {
                Some(name) if template.parameters.contains_key(name) => {}
                other => violations.push(Violation::InstanceRoleNotExternal {
                    profile: id.clone(),
                    role: other.map_or_else(|| role.to_string(), str::to_string),
                }),
            }
        }
    }

    let mut declared: BTreeMap<(&str, String), Vec<String>> = BTreeMap::new();
    for (id, parameter) in &template.parameters {
        let param_type = parameter.param_type.as_str();
        if !EXTERNAL_PARAMETER_TYPES.contains(&param_type) {
            continue;
        }
        let Some(default) = &parameter.default else {
            continue;
        };
        declared
            .entry((param_type, default.to_string()))
            .or_default()
            .push(id.clone());
    }
    for ((parameter_type, _), parameters) in declared {
        if parameters.len() > 1 {
            violations.push(Violation::DuplicateExternalParameter {
                parameter_type: parameter_type.to_string(),
                parameters,
            });
        }
    }
}

fn check_references(template: &Template, violations: &mut Vec<Violation>) {
    let known = |name: &str| {
        template.resources.contains_key(name)
            || template.parameters.contains_key(name)
            || is_pseudo_parameter(name)
    };

    for (id, resource) in &template.resources {
        let mut names = BTreeSet::new();
        for value in resource.properties.values() {
            names.extend(references(value));
        }
        names.extend(resource.depends_on.iter().cloned());
        for name in names {
            if !known(&name) {
                violations.push(Violation::UnresolvedReference {
                    from: id.clone(),
                    name,
                });
            }
        }
    }

    for (id, output) in &template.outputs {
        for name in references(&output.value) {
            if !known(&name) {
                violations.push(Violation::UnresolvedReference {
                    from: id.clone(),
                    name,
                });
            }
        }
    }
}
