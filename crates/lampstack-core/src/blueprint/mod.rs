//! 組み込みLAMPスタック
//!
//! MySQL・phpMyAdmin・PHP-Apache の3コンテナを1台のALBの背後に置く構成。
//! IP許可リスト・イメージタグ・認証情報の参照などの値はすべて [`LampOptions`] に
//! 集約されており、デフォルト値が標準構成になります。
//!
//! - [`lamp_stack`]: オプションから [`Stack`] を直接組み立てる
//! - [`render_kdl`]: 同じ構成を `stack.kdl` として書き出す（`lamp init` で使用）

use crate::error::{Result, StackError};
use crate::model::{
    AliasRecord, AliasTarget, AppProtocol, Capacity, CapacityProvider, Cidr, Cluster, Condition,
    ContainerSpec, EcsService, Environment, ExternalRole, HealthCheck, HostedZone, ImageRef,
    InstanceType, Listener, ListenerRule, LoadBalancer, MachineImage, MountPoint, Network,
    NetworkMode, Output, OutputValue, PortMapping, SecurityGroup, Stack, SubnetSelection,
    TargetGroup, TargetType, TaskSpec, Volume,
};
use crate::secret::SecretRef;
use serde::Serialize;
use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use tera::{Context, Tera};

const STACK_TEMPLATE: &str = include_str!("stack.kdl.tera");

// 論理ID
const ALB_SG: &str = "ALBSecurityGroup";
const ECS_SG: &str = "EcsInstanceSecurityGroup";
const ROLE: &str = "ExistingEcsRole";
const ASG: &str = "EcsAutoScalingGroup";
const CLUSTER: &str = "LampCluster";
const CAPACITY_PROVIDER: &str = "EcsCapacityProvider";
const TASK: &str = "LampTaskDef";
const SERVICE: &str = "LampService";
const ALB: &str = "LampALB";
const DEFAULT_TG: &str = "LampTarget";
const ADMIN_TG: &str = "PhpMyAdminTG";
const LISTENER: &str = "MyListener";
const ADMIN_RULE: &str = "PhpMyAdminRule";
const ZONE: &str = "MyHostedZone";
const RECORD: &str = "WildcardALBARecord";
const OUTPUT: &str = "LoadBalancerDNS";

const EDGE_CIDRS: [Cidr; 2] = [
    Cidr::from_parts(Ipv4Addr::new(122, 210, 238, 201), 32),
    Cidr::from_parts(Ipv4Addr::new(113, 37, 225, 8), 32),
];

const INTERNAL_CIDRS: [Cidr; 2] = [
    Cidr::from_parts(Ipv4Addr::new(10, 0, 0, 0), 20),
    Cidr::from_parts(Ipv4Addr::new(10, 0, 16, 0), 20),
];

const HTML_VOLUME: &str = "html-data";
const MYSQL: &str = "mysql-container";
const PHPMYADMIN: &str = "phpmyadmin-container";
const PHP: &str = "php-apache-container";

/// コンテナイメージのレジストリとタグ
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageOptions {
    pub registry: String,
    pub mysql_tag: String,
    pub phpmyadmin_tag: String,
    pub php_tag: String,
}

impl Default for ImageOptions {
    fn default() -> Self {
        Self {
            registry: "public.ecr.aws/docker/library".to_string(),
            mysql_tag: "9.2.0".to_string(),
            phpmyadmin_tag: "latest".to_string(),
            php_tag: "8.2.27-apache".to_string(),
        }
    }
}

impl ImageOptions {
    fn image(&self, name: &str, tag: &str) -> ImageRef {
        ImageRef::new(format!("{}/{}", self.registry, name), tag)
    }
}

/// データベース設定（パスワードはシークレットストア参照）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatabaseOptions {
    pub name: String,
    pub user: String,
    pub root_password: SecretRef,
    pub password: SecretRef,
}

impl Default for DatabaseOptions {
    fn default() -> Self {
        Self {
            name: "lampdb".to_string(),
            user: "lampuser".to_string(),
            root_password: SecretRef::Ssm {
                parameter: "/lamp/mysql/root-password".to_string(),
            },
            password: SecretRef::Ssm {
                parameter: "/lamp/mysql/password".to_string(),
            },
        }
    }
}

/// LAMPスタックの名前付きオプション
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LampOptions {
    pub stack_name: String,
    pub account: Option<String>,
    pub region: Option<String>,
    pub vpc_id: String,
    pub public_subnets: Vec<String>,
    pub private_subnets: Vec<String>,
    /// ALBへのアクセスを許可する送信元
    pub edge_cidrs: Vec<Cidr>,
    pub edge_ports: Vec<u16>,
    /// ECSインスタンスへのアクセスを許可する送信元（VPC内）
    pub internal_cidrs: Vec<Cidr>,
    pub internal_ports: Vec<u16>,
    pub instance_role_arn: String,
    pub instance_type: InstanceType,
    pub capacity: Capacity,
    pub hosted_zone_id: String,
    pub zone_name: String,
    pub record_name: String,
    /// 8080 のターゲットグループに振り分けるホスト名
    pub admin_host: String,
    /// リスナーポートを 0.0.0.0/0 に開放するか
    pub listener_open: bool,
    pub images: ImageOptions,
    pub database: DatabaseOptions,
}

impl Default for LampOptions {
    fn default() -> Self {
        Self {
            stack_name: "CdkLampStack".to_string(),
            account: None,
            region: None,
            vpc_id: "vpc-02b5eb5d25b928589".to_string(),
            public_subnets: Vec::new(),
            private_subnets: Vec::new(),
            edge_cidrs: EDGE_CIDRS.to_vec(),
            edge_ports: vec![80, 443],
            internal_cidrs: INTERNAL_CIDRS.to_vec(),
            internal_ports: vec![8888, 80, 8080],
            instance_role_arn: "arn:aws:iam::735125878431:role/ecsInstanceRole".to_string(),
            instance_type: InstanceType::of("t2", "small"),
            capacity: Capacity {
                min: 1,
                max: 3,
                desired: 1,
            },
            hosted_zone_id: "Z0961844B43SYO7C4Q38".to_string(),
            zone_name: "sano.ss-sre-admin.net".to_string(),
            record_name: "*.lamp.sano.ss-sre-admin.net".to_string(),
            admin_host: "test.lamp.sano.ss-sre-admin.net".to_string(),
            listener_open: true,
            images: ImageOptions::default(),
            database: DatabaseOptions::default(),
        }
    }
}

fn edge_rule_description(port: u16) -> String {
    match port {
        80 => "Allow HTTP from specific IP".to_string(),
        443 => "Allow HTTPS from specific IP".to_string(),
        other => format!("Allow TCP {} from specific IP", other),
    }
}

fn internal_rule_description(cidr: &Cidr, port: u16) -> String {
    format!("Allow TCP {} from {}", port, cidr)
}

/// php-apache コンテナの起動コマンド
fn php_command() -> Vec<String> {
    vec![
        "/bin/sh".to_string(),
        "-c".to_string(),
        "echo \"<?php phpinfo(); ?>\" > /var/www/html/index.php && apache2-foreground".to_string(),
    ]
}

fn env(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn secrets(pairs: &[(&str, &SecretRef)]) -> BTreeMap<String, SecretRef> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), (*v).clone()))
        .collect()
}

fn containers(opts: &LampOptions) -> Vec<ContainerSpec> {
    let db = &opts.database;

    let mut mysql = ContainerSpec::new(MYSQL, opts.images.image("mysql", &opts.images.mysql_tag));
    mysql.memory_mib = Some(1024);
    mysql.cpu = Some(512);
    mysql.environment = env(&[("MYSQL_DATABASE", &db.name), ("MYSQL_USER", &db.user)]);
    mysql.secrets = secrets(&[
        ("MYSQL_ROOT_PASSWORD", &db.root_password),
        ("MYSQL_PASSWORD", &db.password),
    ]);
    mysql.ports = vec![PortMapping::tcp(3306, 3306)];
    mysql.log_stream_prefix = Some("mysql".to_string());

    let mut admin = ContainerSpec::new(
        PHPMYADMIN,
        opts.images.image("phpmyadmin", &opts.images.phpmyadmin_tag),
    );
    admin.memory_mib = Some(256);
    admin.cpu = Some(128);
    admin.environment = env(&[("PMA_HOST", MYSQL), ("PMA_PORT", "3306")]);
    admin.secrets = secrets(&[("MYSQL_ROOT_PASSWORD", &db.root_password)]);
    admin.ports = vec![PortMapping::tcp(80, 8888)];
    admin.log_stream_prefix = Some("phpmyadmin".to_string());

    let mut php = ContainerSpec::new(PHP, opts.images.image("php", &opts.images.php_tag));
    php.memory_mib = Some(256);
    php.cpu = Some(384);
    php.environment = env(&[
        ("DB_HOST", MYSQL),
        ("DB_USER", &db.user),
        ("DB_NAME", &db.name),
    ]);
    php.secrets = secrets(&[("DB_PASSWORD", &db.password)]);
    php.ports = vec![PortMapping::tcp(80, 8080)];
    php.mounts = vec![MountPoint {
        source_volume: HTML_VOLUME.to_string(),
        container_path: "/var/www/html".to_string(),
        read_only: false,
    }];
    php.command = php_command();
    php.log_stream_prefix = Some("php-apache".to_string());

    vec![mysql, admin, php]
}

fn target_group(id: &str, name: Option<&str>, port: u16) -> TargetGroup {
    TargetGroup {
        id: id.to_string(),
        name: name.map(str::to_string),
        protocol: AppProtocol::Http,
        port,
        target_type: TargetType::Instance,
        health_check: HealthCheck {
            path: "/".to_string(),
            interval_secs: 30,
            ..Default::default()
        },
        targets: vec![ASG.to_string()],
    }
}

/// オプションからLAMPスタックを組み立てる
pub fn lamp_stack(opts: &LampOptions) -> Stack {
    let mut alb_sg = SecurityGroup::new(ALB_SG, "Allow HTTP from specific IP");
    for cidr in &opts.edge_cidrs {
        for port in &opts.edge_ports {
            alb_sg = alb_sg.allow_tcp(*cidr, *port, edge_rule_description(*port));
        }
    }

    let mut ecs_sg = SecurityGroup::new(ECS_SG, "Allow inbound traffic from ALB");
    for cidr in &opts.internal_cidrs {
        for port in &opts.internal_ports {
            ecs_sg = ecs_sg.allow_tcp(*cidr, *port, internal_rule_description(cidr, *port));
        }
    }

    Stack {
        name: opts.stack_name.clone(),
        description: None,
        environment: Environment {
            account: opts.account.clone(),
            region: opts.region.clone(),
        },
        network: Network {
            vpc_id: opts.vpc_id.clone(),
            public_subnets: opts.public_subnets.clone(),
            private_subnets: opts.private_subnets.clone(),
        },
        security_groups: vec![alb_sg, ecs_sg],
        roles: vec![ExternalRole {
            id: ROLE.to_string(),
            arn: opts.instance_role_arn.clone(),
        }],
        compute: vec![crate::model::ComputePool {
            id: ASG.to_string(),
            instance_type: opts.instance_type.clone(),
            machine_image: MachineImage::EcsAmazonLinux2023,
            capacity: opts.capacity,
            subnets: SubnetSelection::Private,
            role: ROLE.to_string(),
            security_group: ECS_SG.to_string(),
        }],
        clusters: vec![Cluster {
            id: CLUSTER.to_string(),
            capacity_provider: Some(CapacityProvider::for_compute(CAPACITY_PROVIDER, ASG)),
        }],
        tasks: vec![TaskSpec {
            id: TASK.to_string(),
            network_mode: NetworkMode::Bridge,
            volumes: vec![Volume {
                name: HTML_VOLUME.to_string(),
            }],
            containers: containers(opts),
        }],
        services: vec![EcsService::new(SERVICE, CLUSTER, TASK)],
        load_balancers: vec![LoadBalancer {
            id: ALB.to_string(),
            internet_facing: true,
            subnets: SubnetSelection::Public,
            security_group: ALB_SG.to_string(),
            target_groups: vec![
                target_group(DEFAULT_TG, Some("LampTargetGroup"), 8888),
                target_group(ADMIN_TG, None, 8080),
            ],
            listeners: vec![Listener {
                id: LISTENER.to_string(),
                port: 80,
                protocol: AppProtocol::Http,
                open: opts.listener_open,
                default_target_group: DEFAULT_TG.to_string(),
                rules: vec![ListenerRule {
                    id: ADMIN_RULE.to_string(),
                    priority: 1,
                    conditions: vec![Condition::HostHeader(vec![opts.admin_host.clone()])],
                    forward: ADMIN_TG.to_string(),
                }],
            }],
        }],
        hosted_zones: vec![HostedZone {
            id: ZONE.to_string(),
            zone_id: opts.hosted_zone_id.clone(),
            zone_name: opts.zone_name.clone(),
        }],
        records: vec![AliasRecord {
            id: RECORD.to_string(),
            zone: ZONE.to_string(),
            record_name: opts.record_name.clone(),
            target: AliasTarget::LoadBalancer(ALB.to_string()),
        }],
        outputs: vec![Output {
            id: OUTPUT.to_string(),
            value: OutputValue::LoadBalancerDnsName(ALB.to_string()),
            description: None,
            export_name: None,
        }],
    }
}

/// 同じ構成を `stack.kdl` として書き出す
pub fn render_kdl(opts: &LampOptions) -> Result<String> {
    let images = &opts.images;
    let mut context = Context::new();
    context.insert("opts", opts);
    context.insert("mysql_image", &images.image("mysql", &images.mysql_tag).to_string());
    context.insert(
        "phpmyadmin_image",
        &images.image("phpmyadmin", &images.phpmyadmin_tag).to_string(),
    );
    context.insert("php_image", &images.image("php", &images.php_tag).to_string());
    context.insert("php_command", &php_command());
    context.insert("instance_type", &opts.instance_type.to_string());

    Tera::one_off(STACK_TEMPLATE, &context, false)
        .map_err(|e| StackError::TemplateRenderError(crate::template::describe_tera_error(&e)))
}
