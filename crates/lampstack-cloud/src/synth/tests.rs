use super::*;
use crate::checks::verify;
use crate::graph::ResourceGraph;
use lampstack_core::{LampOptions, PortMapping, StackError, lamp_stack};
use serde_json::json;

fn lamp_template(opts: &LampOptions) -> Template {
    synthesize(&lamp_stack(opts)).unwrap()
}

fn default_template() -> Template {
    lamp_template(&LampOptions::default())
}

fn props<'a>(template: &'a Template, id: &str) -> &'a Map<String, Value> {
    &template
        .resource(id)
        .unwrap_or_else(|| panic!("missing resource {id}"))
        .properties
}

#[test]
fn test_lamp_resources() {
    let template = default_template();

    let ids: Vec<_> = template.resources.keys().map(String::as_str).collect();
    assert_eq!(
        ids,
        vec![
            "ALBSecurityGroup",
            "EcsAutoScalingGroup",
            "EcsAutoScalingGroupInstanceProfile",
            "EcsAutoScalingGroupLaunchTemplate",
            "EcsCapacityProvider",
            "EcsInstanceSecurityGroup",
            "EcsInstanceSecurityGroupFromALBSecurityGroup8080",
            "EcsInstanceSecurityGroupFromALBSecurityGroup8888",
            "LampALB",
            "LampCluster",
            "LampClusterCapacityProviderAssociations",
            "LampService",
            "LampTarget",
            "LampTaskDef",
            "LampTaskDefExecutionRole",
            "LampTaskDefMysqlContainerLogGroup",
            "LampTaskDefPhpApacheContainerLogGroup",
            "LampTaskDefPhpmyadminContainerLogGroup",
            "MyListener",
            "PhpMyAdminRule",
            "PhpMyAdminTG",
            "WildcardALBARecord",
        ]
    );

    let parameters: Vec<_> = template.parameters.keys().map(String::as_str).collect();
    assert_eq!(
        parameters,
        vec![
            "EcsAutoScalingGroupImageId",
            "ExistingEcsRole",
            "MyHostedZone",
            "PrivateSubnetIds",
            "PublicSubnetIds",
            "VpcId",
        ]
    );
    assert_eq!(template.outputs.len(), 1);
}

#[test]
fn test_external_ids_are_parameters() {
    let template = default_template();

    let vpc = &template.parameters["VpcId"];
    assert_eq!(vpc.param_type, "AWS::EC2::VPC::Id");
    assert_eq!(vpc.default, Some(json!("vpc-02b5eb5d25b928589")));

    let role = &template.parameters["ExistingEcsRole"];
    assert_eq!(role.default, Some(json!("ecsInstanceRole")));

    let zone = &template.parameters["MyHostedZone"];
    assert_eq!(zone.param_type, "AWS::Route53::HostedZone::Id");
    assert_eq!(zone.default, Some(json!("Z0961844B43SYO7C4Q38")));

    // no subnet ids known: supplied at deploy time
    assert_eq!(template.parameters["PublicSubnetIds"].default, None);

    let image = &template.parameters["EcsAutoScalingGroupImageId"];
    assert_eq!(
        image.param_type,
        "AWS::SSM::Parameter::Value<AWS::EC2::Image::Id>"
    );
}

#[test]
fn test_subnet_defaults() {
    let template = lamp_template(&LampOptions {
        public_subnets: vec!["subnet-a".to_string(), "subnet-c".to_string()],
        ..Default::default()
    });
    assert_eq!(
        template.parameters["PublicSubnetIds"].default,
        Some(json!("subnet-a,subnet-c"))
    );
    assert_eq!(
        props(&template, "LampALB")["Subnets"],
        json!({"Ref": "PublicSubnetIds"})
    );
    assert_eq!(
        props(&template, "EcsAutoScalingGroup")["VPCZoneIdentifier"],
        json!({"Ref": "PrivateSubnetIds"})
    );
}

#[test]
fn test_security_group_rules() {
    let template = default_template();

    let alb = props(&template, "ALBSecurityGroup");
    let ingress = alb["SecurityGroupIngress"].as_array().unwrap();
    assert_eq!(ingress.len(), 5);
    assert_eq!(
        ingress[0],
        json!({
            "CidrIp": "122.210.238.201/32",
            "IpProtocol": "tcp",
            "FromPort": 80,
            "ToPort": 80,
            "Description": "Allow HTTP from specific IP",
        })
    );
    assert_eq!(alb["SecurityGroupEgress"][0]["IpProtocol"], "-1");
    assert_eq!(alb["VpcId"], json!({"Ref": "VpcId"}));

    let ecs = props(&template, "EcsInstanceSecurityGroup");
    assert_eq!(ecs["SecurityGroupIngress"].as_array().unwrap().len(), 6);

    let from_alb = props(&template, "EcsInstanceSecurityGroupFromALBSecurityGroup8888");
    assert_eq!(
        from_alb["SourceSecurityGroupId"],
        json!({"Fn::GetAtt": ["ALBSecurityGroup", "GroupId"]})
    );
    assert_eq!(from_alb["FromPort"], 8888);
}

#[test]
fn test_open_listener() {
    let template = default_template();

    let ingress = props(&template, "ALBSecurityGroup")["SecurityGroupIngress"]
        .as_array()
        .unwrap();
    assert_eq!(ingress.len(), 5);
    assert_eq!(ingress[4]["CidrIp"], "0.0.0.0/0");
    assert_eq!(ingress[4]["FromPort"], 80);
    assert_eq!(ingress[4]["Description"], "Allow from anyone on port 80");
}

#[test]
fn test_closed_listener_keeps_allow_list() {
    let template = lamp_template(&LampOptions {
        listener_open: false,
        ..Default::default()
    });

    let ingress = props(&template, "ALBSecurityGroup")["SecurityGroupIngress"]
        .as_array()
        .unwrap();
    assert_eq!(ingress.len(), 4);
    assert!(ingress.iter().all(|rule| rule["CidrIp"] != "0.0.0.0/0"));
}

#[test]
fn test_compute_and_cluster() {
    let template = default_template();

    let launch = &props(&template, "EcsAutoScalingGroupLaunchTemplate")["LaunchTemplateData"];
    assert_eq!(launch["InstanceType"], "t2.small");
    assert_eq!(launch["ImageId"], json!({"Ref": "EcsAutoScalingGroupImageId"}));
    let user_data = launch["UserData"]["Fn::Base64"]["Fn::Sub"].as_str().unwrap();
    assert!(user_data.contains("ECS_CLUSTER=${LampCluster}"));

    let profile = props(&template, "EcsAutoScalingGroupInstanceProfile");
    assert_eq!(profile["Roles"], json!([{"Ref": "ExistingEcsRole"}]));

    let asg = props(&template, "EcsAutoScalingGroup");
    assert_eq!(asg["MinSize"], "1");
    assert_eq!(asg["MaxSize"], "3");
    assert_eq!(asg["DesiredCapacity"], "1");
    assert_eq!(
        asg["TargetGroupARNs"],
        json!([{"Ref": "LampTarget"}, {"Ref": "PhpMyAdminTG"}])
    );

    assert_eq!(asg["NewInstancesProtectedFromScaleIn"], true);

    let cp = props(&template, "EcsCapacityProvider");
    assert_eq!(
        cp["AutoScalingGroupProvider"]["AutoScalingGroupArn"],
        json!({"Ref": "EcsAutoScalingGroup"})
    );
    assert_eq!(
        cp["AutoScalingGroupProvider"]["ManagedTerminationProtection"],
        "ENABLED"
    );

    let service = template.resource("LampService").unwrap();
    assert_eq!(service.depends_on, vec!["LampClusterCapacityProviderAssociations"]);
    assert_eq!(
        service.properties["CapacityProviderStrategy"][0]["CapacityProvider"],
        json!({"Ref": "EcsCapacityProvider"})
    );
    assert!(service.properties.get("LaunchType").is_none());
}

#[test]
fn test_container_definitions() {
    let template = default_template();
    let task = props(&template, "LampTaskDef");
    assert_eq!(task["NetworkMode"], "bridge");
    assert_eq!(task["Family"], "CdkLampStackLampTaskDef");
    assert_eq!(task["Volumes"], json!([{"Name": "html-data"}]));
    assert_eq!(
        task["ExecutionRoleArn"],
        json!({"Fn::GetAtt": ["LampTaskDefExecutionRole", "Arn"]})
    );

    let containers = task["ContainerDefinitions"].as_array().unwrap();
    let ports: Vec<_> = containers
        .iter()
        .map(|c| {
            let mapping = &c["PortMappings"][0];
            (
                c["Name"].as_str().unwrap(),
                mapping["ContainerPort"].as_u64().unwrap(),
                mapping["HostPort"].as_u64().unwrap(),
            )
        })
        .collect();
    assert_eq!(
        ports,
        vec![
            ("mysql-container", 3306, 3306),
            ("phpmyadmin-container", 80, 8888),
            ("php-apache-container", 80, 8080),
        ]
    );

    let mysql = &containers[0];
    assert_eq!(
        mysql["Environment"],
        json!([
            {"Name": "MYSQL_DATABASE", "Value": "lampdb"},
            {"Name": "MYSQL_USER", "Value": "lampuser"},
        ])
    );
    assert_eq!(
        mysql["Secrets"],
        json!([
            {"Name": "MYSQL_PASSWORD", "ValueFrom": "/lamp/mysql/password"},
            {"Name": "MYSQL_ROOT_PASSWORD", "ValueFrom": "/lamp/mysql/root-password"},
        ])
    );
    // credentials never appear as plain environment values
    let env_names: Vec<_> = containers
        .iter()
        .flat_map(|c| c["Environment"].as_array().unwrap())
        .map(|e| e["Name"].as_str().unwrap())
        .collect();
    assert!(!env_names.iter().any(|n| n.contains("PASSWORD")));

    let php = &containers[2];
    assert_eq!(php["MountPoints"][0]["ContainerPath"], "/var/www/html");
    assert_eq!(php["Command"][0], "/bin/sh");
    assert_eq!(
        php["LogConfiguration"]["Options"]["awslogs-group"],
        json!({"Ref": "LampTaskDefPhpApacheContainerLogGroup"})
    );
    assert_eq!(php["LogConfiguration"]["Options"]["awslogs-stream-prefix"], "php-apache");
}

#[test]
fn test_execution_role_grants_parameters() {
    let template = default_template();
    let role = props(&template, "LampTaskDefExecutionRole");
    let statement = &role["Policies"][0]["PolicyDocument"]["Statement"][0];
    assert_eq!(statement["Action"], "ssm:GetParameters");
    assert_eq!(
        statement["Resource"],
        json!([
            {"Fn::Sub": "arn:${AWS::Partition}:ssm:${AWS::Region}:${AWS::AccountId}:parameter/lamp/mysql/password"},
            {"Fn::Sub": "arn:${AWS::Partition}:ssm:${AWS::Region}:${AWS::AccountId}:parameter/lamp/mysql/root-password"},
        ])
    );
}

#[test]
fn test_load_balancer() {
    let template = default_template();

    let alb = props(&template, "LampALB");
    assert_eq!(alb["Scheme"], "internet-facing");
    assert_eq!(
        alb["SecurityGroups"],
        json!([{"Fn::GetAtt": ["ALBSecurityGroup", "GroupId"]}])
    );

    let target = props(&template, "LampTarget");
    assert_eq!(target["Name"], "LampTargetGroup");
    assert_eq!(target["Port"], 8888);
    assert_eq!(target["HealthCheckPath"], "/");
    assert_eq!(target["HealthCheckIntervalSeconds"], 30);
    assert!(props(&template, "PhpMyAdminTG").get("Name").is_none());

    let listener = props(&template, "MyListener");
    assert_eq!(listener["Port"], 80);
    assert_eq!(
        listener["DefaultActions"],
        json!([{"Type": "forward", "TargetGroupArn": {"Ref": "LampTarget"}}])
    );

    let rule = props(&template, "PhpMyAdminRule");
    assert_eq!(rule["Priority"], 1);
    assert_eq!(
        rule["Conditions"],
        json!([{
            "Field": "host-header",
            "HostHeaderConfig": {"Values": ["test.lamp.sano.ss-sre-admin.net"]},
        }])
    );
    assert_eq!(rule["Actions"][0]["TargetGroupArn"], json!({"Ref": "PhpMyAdminTG"}));
}

#[test]
fn test_alias_record_and_output() {
    let template = default_template();

    let record = props(&template, "WildcardALBARecord");
    assert_eq!(record["Name"], "*.lamp.sano.ss-sre-admin.net.");
    assert_eq!(record["Type"], "A");
    assert_eq!(record["HostedZoneId"], json!({"Ref": "MyHostedZone"}));
    assert_eq!(
        record["AliasTarget"]["DNSName"],
        json!({"Fn::Join": ["", ["dualstack.", {"Fn::GetAtt": ["LampALB", "DNSName"]}]]})
    );

    let output = &template.outputs["LoadBalancerDNS"];
    assert_eq!(output.value, json!({"Fn::GetAtt": ["LampALB", "DNSName"]}));
}

#[test]
fn test_environment_metadata() {
    assert!(default_template().metadata.is_empty());

    let template = lamp_template(&LampOptions {
        account: Some("735125878431".to_string()),
        region: Some("ap-northeast-1".to_string()),
        ..Default::default()
    });
    assert_eq!(
        template.metadata[ENVIRONMENT_METADATA],
        json!({"Account": "735125878431", "Region": "ap-northeast-1"})
    );
}

#[test]
fn test_rendering_is_deterministic() {
    let first = default_template().to_json_pretty().unwrap();
    let second = default_template().to_json_pretty().unwrap();
    assert_eq!(first, second);

    let yaml = default_template().to_yaml().unwrap();
    assert!(yaml.contains("AWSTemplateFormatVersion"));
}

#[test]
fn test_lamp_template_passes_checks() {
    let template = default_template();
    assert_eq!(verify(&template), Vec::new());

    let graph = ResourceGraph::from_template(&template);
    let order = graph.deployment_order().unwrap();
    let position = |id: &str| order.iter().position(|o| o == id).unwrap();
    assert!(position("LampCluster") < position("EcsAutoScalingGroupLaunchTemplate"));
    assert!(position("EcsAutoScalingGroup") < position("EcsCapacityProvider"));
    assert!(position("LampClusterCapacityProviderAssociations") < position("LampService"));
    assert!(position("MyListener") < position("PhpMyAdminRule"));
}

#[test]
fn test_dynamic_host_ports_synthesize() {
    let mut stack = lamp_stack(&LampOptions::default());
    stack.tasks[0].containers[1].ports = vec![PortMapping::tcp(80, 0)];
    stack.tasks[0].containers[2].ports = vec![PortMapping::tcp(80, 0)];

    let template = synthesize(&stack).unwrap();
    assert_eq!(verify(&template), Vec::new());
    let containers = props(&template, "LampTaskDef")["ContainerDefinitions"]
        .as_array()
        .unwrap();
    assert_eq!(containers[2]["PortMappings"][0]["HostPort"], 0);
}

#[test]
fn test_invalid_stack_is_rejected() {
    let mut stack = lamp_stack(&LampOptions::default());
    stack.services[0].cluster = "MissingCluster".to_string();

    let err = synthesize(&stack).unwrap_err();
    assert!(matches!(err, CloudError::Stack(StackError::Invalid(_))));
}

#[test]
fn test_logical_id_must_be_alphanumeric() {
    let mut stack = lamp_stack(&LampOptions::default());
    stack.records[0].id = "wildcard-record".to_string();

    let err = synthesize(&stack).unwrap_err();
    assert!(matches!(err, CloudError::InvalidLogicalId(id) if id == "wildcard-record"));
}

#[test]
fn test_pascal_case() {
    assert_eq!(pascal_case("mysql-container"), "MysqlContainer");
    assert_eq!(pascal_case("php-apache-container"), "PhpApacheContainer");
    assert_eq!(pascal_case("already"), "Already");
    assert!(is_logical_id("LampALB"));
    assert!(!is_logical_id("Lamp_ALB"));
    assert!(!is_logical_id(""));
}
