//! Resource dependency graph
//!
//! Edges come from `Ref`, `Fn::GetAtt`, `Fn::Sub` and `DependsOn`. References
//! to parameters and pseudo parameters are kept on the node but are not edges.
//! CloudFormation computes its own order at deploy time; this view is for
//! inspection (`lamp graph`) and for catching cycles before upload.

use crate::error::{CloudError, Result};
use crate::intrinsic::{is_pseudo_parameter, references};
use crate::template::Template;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

/// One resource and what it points at
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResourceNode {
    pub resource_type: String,
    /// Resources that must exist first
    pub depends_on: BTreeSet<String>,
    pub parameters: BTreeSet<String>,
    pub pseudo_parameters: BTreeSet<String>,
    /// Names that are neither resources nor parameters
    pub unresolved: BTreeSet<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ResourceGraph {
    nodes: BTreeMap<String, ResourceNode>,
}

impl ResourceGraph {
    pub fn from_template(template: &Template) -> Self {
        let mut nodes = BTreeMap::new();

        for (id, resource) in &template.resources {
            let mut node = ResourceNode {
                resource_type: resource.resource_type.clone(),
                ..Default::default()
            };

            let mut names = BTreeSet::new();
            for value in resource.properties.values() {
                names.extend(references(value));
            }
            names.extend(resource.depends_on.iter().cloned());

            for name in names {
                if template.resources.contains_key(&name) {
                    if name != *id {
                        node.depends_on.insert(name);
                    }
                } else if template.parameters.contains_key(&name) {
                    node.parameters.insert(name);
                } else if is_pseudo_parameter(&name) {
                    node.pseudo_parameters.insert(name);
                } else {
                    node.unresolved.insert(name);
                }
            }

            nodes.insert(id.clone(), node);
        }

        Self { nodes }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: &str) -> Option<&ResourceNode> {
        self.nodes.get(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = (&String, &ResourceNode)> {
        self.nodes.iter()
    }

    /// Resources that reference `id`
    pub fn dependents(&self, id: &str) -> Vec<&str> {
        self.nodes
            .iter()
            .filter(|(_, node)| node.depends_on.contains(id))
            .map(|(other, _)| other.as_str())
            .collect()
    }

    /// Topological order; among ready resources the smallest logical id goes first
    pub fn deployment_order(&self) -> Result<Vec<String>> {
        let mut remaining: BTreeMap<&str, BTreeSet<&str>> = self
            .nodes
            .iter()
            .map(|(id, node)| {
                (
                    id.as_str(),
                    node.depends_on.iter().map(String::as_str).collect(),
                )
            })
            .collect();
        let mut order = Vec::with_capacity(self.nodes.len());

        while let Some(next) = remaining
            .iter()
            .find(|(_, deps)| deps.is_empty())
            .map(|(id, _)| *id)
        {
            remaining.remove(next);
            for deps in remaining.values_mut() {
                deps.remove(next);
            }
            order.push(next.to_string());
        }

        if !remaining.is_empty() {
            return Err(CloudError::CircularDependency(find_cycle(&remaining)));
        }

        debug!(resources = order.len(), "Computed deployment order");
        Ok(order)
    }

    /// Groups of resources that can be created in parallel
    ///
    /// Every dependency of a resource in wave N lives in waves 0..N.
    pub fn waves(&self) -> Result<Vec<Vec<String>>> {
        let mut placed: BTreeSet<&str> = BTreeSet::new();
        let mut waves = Vec::new();

        while placed.len() < self.nodes.len() {
            let wave: Vec<&str> = self
                .nodes
                .iter()
                .filter(|(id, _)| !placed.contains(id.as_str()))
                .filter(|(_, node)| node.depends_on.iter().all(|d| placed.contains(d.as_str())))
                .map(|(id, _)| id.as_str())
                .collect();

            if wave.is_empty() {
                let remaining: BTreeMap<&str, BTreeSet<&str>> = self
                    .nodes
                    .iter()
                    .filter(|(id, _)| !placed.contains(id.as_str()))
                    .map(|(id, node)| {
                        (
                            id.as_str(),
                            node.depends_on
                                .iter()
                                .map(String::as_str)
                                .filter(|d| !placed.contains(d))
                                .collect(),
                        )
                    })
                    .collect();
                return Err(CloudError::CircularDependency(find_cycle(&remaining)));
            }

            placed.extend(wave.iter().copied());
            waves.push(wave.into_iter().map(str::to_string).collect());
        }

        info!(
            waves = waves.len(),
            resources = self.nodes.len(),
            "Computed deployment waves"
        );
        Ok(waves)
    }
}

/// Walk unresolved dependencies until a resource repeats
///
/// Every entry in `remaining` still has at least one dependency inside it.
fn find_cycle(remaining: &BTreeMap<&str, BTreeSet<&str>>) -> Vec<String> {
    let Some(&start) = remaining.keys().next() else {
        return Vec::new();
    };

    let mut path: Vec<&str> = vec![start];
    let mut current = start;
    loop {
        let Some(next) = remaining
            .get(current)
            .and_then(|deps| deps.iter().copied().find(|d| remaining.contains_key(d)))
        else {
            return path.into_iter().map(str::to_string).collect();
        };
        if let Some(pos) = path.iter().position(|p| *p == next) {
            let mut cycle: Vec<String> = path[pos..].iter().map(|s| s.to_string()).collect();
            cycle.push(next.to_string());
            return cycle;
        }
        path.push(next);
        current = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intrinsic::{get_att, reference};
    use crate::template::{Parameter, Resource};
    use serde_json::json;

    fn template() -> Template {
        let mut t = Template::new();
        t.add_parameter("VpcId", Parameter::new("AWS::EC2::VPC::Id"))
            .unwrap();
        t.add_resource(
            "Sg",
            Resource::new("AWS::EC2::SecurityGroup", json!({"VpcId": reference("VpcId")})),
        )
        .unwrap();
        t.add_resource(
            "Lb",
            Resource::new(
                "AWS::ElasticLoadBalancingV2::LoadBalancer",
                json!({"SecurityGroups": [get_att("Sg", "GroupId")]}),
            ),
        )
        .unwrap();
        t.add_resource(
            "Cluster",
            Resource::new("AWS::ECS::Cluster", json!({})),
        )
        .unwrap();
        t.add_resource(
            "Listener",
            Resource::new(
                "AWS::ElasticLoadBalancingV2::Listener",
                json!({"LoadBalancerArn": reference("Lb"), "Region": reference("AWS::Region")}),
            )
            .depends_on("Cluster"),
        )
        .unwrap();
        t
    }

    #[test]
    fn test_edges_and_parameters() {
        let graph = ResourceGraph::from_template(&template());
        let sg = graph.node("Sg").unwrap();
        assert!(sg.depends_on.is_empty());
        assert!(sg.parameters.contains("VpcId"));

        let listener = graph.node("Listener").unwrap();
        assert_eq!(
            listener.depends_on.iter().collect::<Vec<_>>(),
            vec!["Cluster", "Lb"]
        );
        assert!(listener.pseudo_parameters.contains("AWS::Region"));
        assert_eq!(graph.dependents("Sg"), vec!["Lb"]);
    }

    #[test]
    fn test_deployment_order() {
        let graph = ResourceGraph::from_template(&template());
        let order = graph.deployment_order().unwrap();
        assert_eq!(order, vec!["Cluster", "Sg", "Lb", "Listener"]);
    }

    #[test]
    fn test_waves() {
        let graph = ResourceGraph::from_template(&template());
        let waves = graph.waves().unwrap();
        assert_eq!(
            waves,
            vec![
                vec!["Cluster".to_string(), "Sg".to_string()],
                vec!["Lb".to_string()],
                vec!["Listener".to_string()],
            ]
        );
    }

    #[test]
    fn test_cycle_is_reported() {
        let mut t = Template::new();
        t.add_resource("A", Resource::new("X", json!({"P": reference("B")})))
            .unwrap();
        t.add_resource("B", Resource::new("X", json!({"P": get_att("C", "Arn")})))
            .unwrap();
        t.add_resource("C", Resource::new("X", json!({})).depends_on("A"))
            .unwrap();
        t.add_resource("D", Resource::new("X", json!({})))
            .unwrap();

        let graph = ResourceGraph::from_template(&t);
        let err = graph.deployment_order().unwrap_err();
        match err {
            CloudError::CircularDependency(cycle) => {
                assert_eq!(cycle, vec!["A", "B", "C", "A"]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(matches!(
            graph.waves(),
            Err(CloudError::CircularDependency(_))
        ));
    }

    #[test]
    fn test_unresolved_names() {
        let mut t = Template::new();
        t.add_resource("A", Resource::new("X", json!({"P": reference("Missing")})))
            .unwrap();
        let graph = ResourceGraph::from_template(&t);
        assert!(graph.node("A").unwrap().unresolved.contains("Missing"));
    }
}
