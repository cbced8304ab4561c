//! Intrinsic function helpers
//!
//! Builders for `Ref`, `Fn::GetAtt`, `Fn::Join`, `Fn::Sub` and `Fn::Base64`,
//! plus [`references`], which walks a property tree and reports every logical
//! id it points at.

use serde_json::{Value, json};
use std::collections::BTreeSet;

pub const AWS_REGION: &str = "AWS::Region";
pub const AWS_ACCOUNT_ID: &str = "AWS::AccountId";
pub const AWS_PARTITION: &str = "AWS::Partition";
pub const AWS_STACK_NAME: &str = "AWS::StackName";

/// `{"Ref": id}`
pub fn reference(id: &str) -> Value {
    json!({ "Ref": id })
}

/// `{"Fn::GetAtt": [id, attribute]}`
pub fn get_att(id: &str, attribute: &str) -> Value {
    json!({ "Fn::GetAtt": [id, attribute] })
}

/// `{"Fn::Join": [delimiter, parts]}`
pub fn join(delimiter: &str, parts: Vec<Value>) -> Value {
    json!({ "Fn::Join": [delimiter, parts] })
}

/// `{"Fn::Sub": template}`
pub fn sub(template: &str) -> Value {
    json!({ "Fn::Sub": template })
}

/// `{"Fn::Base64": value}`
pub fn base64(value: Value) -> Value {
    json!({ "Fn::Base64": value })
}

/// Pseudo parameters such as `AWS::Region`
pub fn is_pseudo_parameter(name: &str) -> bool {
    name.starts_with("AWS::")
}

/// Collect every name referenced by `Ref`, `Fn::GetAtt` and `Fn::Sub` inside `value`
///
/// Pseudo parameters are included; callers decide how to classify them.
pub fn references(value: &Value) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    collect(value, &mut out);
    out
}

fn collect(value: &Value, out: &mut BTreeSet<String>) {
    match value {
        Value::Object(map) if map.len() == 1 => {
            if let Some(Value::String(id)) = map.get("Ref") {
                out.insert(id.clone());
                return;
            }
            if let Some(target) = map.get("Fn::GetAtt") {
                match target {
                    Value::Array(parts) => {
                        if let Some(Value::String(id)) = parts.first() {
                            out.insert(id.clone());
                        }
                    }
                    // "Resource.Attribute" form
                    Value::String(dotted) => {
                        if let Some(id) = dotted.split('.').next() {
                            out.insert(id.to_string());
                        }
                    }
                    _ => {}
                }
                return;
            }
            if let Some(target) = map.get("Fn::Sub") {
                collect_sub(target, out);
                return;
            }
            map.values().for_each(|v| collect(v, out));
        }
        Value::Object(map) => map.values().for_each(|v| collect(v, out)),
        Value::Array(items) => items.iter().for_each(|v| collect(v, out)),
        _ => {}
    }
}

fn collect_sub(target: &Value, out: &mut BTreeSet<String>) {
    match target {
        Value::String(template) => out.extend(sub_variables(template)),
        Value::Array(parts) => {
            let Some(Value::String(template)) = parts.first() else {
                return;
            };
            let local: BTreeSet<&str> = match parts.get(1) {
                Some(Value::Object(vars)) => vars.keys().map(String::as_str).collect(),
                _ => BTreeSet::new(),
            };
            out.extend(
                sub_variables(template)
                    .into_iter()
                    .filter(|name| !local.contains(name.as_str())),
            );
            if let Some(vars) = parts.get(1) {
                collect(vars, out);
            }
        }
        _ => {}
    }
}

/// Names used as `${Name}` or `${Name.Attribute}` in a `Fn::Sub` template
///
/// `${!Literal}` is an escape and is skipped.
pub fn sub_variables(template: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut rest = template;
    while let Some(start) = rest.find("${") {
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            break;
        };
        let body = &after[..end];
        if !body.starts_with('!') && !body.is_empty() {
            let name = body.split('.').next().unwrap_or(body);
            names.push(name.to_string());
        }
        rest = &after[end + 1..];
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builders() {
        assert_eq!(reference("VpcId"), json!({"Ref": "VpcId"}));
        assert_eq!(
            get_att("LampALB", "DNSName"),
            json!({"Fn::GetAtt": ["LampALB", "DNSName"]})
        );
        assert_eq!(
            base64(sub("echo ${LampCluster}")),
            json!({"Fn::Base64": {"Fn::Sub": "echo ${LampCluster}"}})
        );
    }

    #[test]
    fn test_references_walks_nested_values() {
        let value = json!({
            "AliasTarget": {
                "DNSName": join("", vec![json!("dualstack."), get_att("LampALB", "DNSName")]),
                "HostedZoneId": get_att("LampALB", "CanonicalHostedZoneID"),
            },
            "HostedZoneId": reference("MyHostedZone"),
            "Region": reference(AWS_REGION),
        });
        let refs = references(&value);
        assert_eq!(
            refs.into_iter().collect::<Vec<_>>(),
            vec!["AWS::Region", "LampALB", "MyHostedZone"]
        );
    }

    #[test]
    fn test_sub_variables() {
        assert_eq!(
            sub_variables("arn:${AWS::Partition}:ssm:${AWS::Region}:${Role.Arn}/${!Literal}"),
            vec!["AWS::Partition", "AWS::Region", "Role"]
        );
        assert!(sub_variables("no variables ${").is_empty());
    }

    #[test]
    fn test_sub_with_local_variables() {
        let value = json!({
            "Fn::Sub": ["${Cluster}-${Name}", {"Name": reference("LampService")}]
        });
        let refs = references(&value);
        assert!(refs.contains("Cluster"));
        assert!(refs.contains("LampService"));
        assert!(!refs.contains("Name"));
    }

    #[test]
    fn test_dotted_get_att() {
        let refs = references(&json!({"Fn::GetAtt": "LampALB.DNSName"}));
        assert!(refs.contains("LampALB"));
    }
}
