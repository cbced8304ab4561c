//! Instance role parameters, launch templates and Auto Scaling groups

use super::network;
use crate::error::Result;
use crate::intrinsic::{base64, get_att, reference, sub};
use crate::template::{Parameter, Resource, Template};
use lampstack_core::{ComputePool, MachineImage, Stack};
use serde_json::{Value, json};

pub(super) fn synthesize(stack: &Stack, template: &mut Template) -> Result<()> {
    for role in &stack.roles {
        let name = role.role_name().unwrap_or(&role.arn);
        template.add_parameter(
            &role.id,
            Parameter::new("String")
                .with_description(format!("Name of the existing IAM role {}", role.arn))
                .with_default(name),
        )?;
    }

    for pool in &stack.compute {
        synthesize_pool(stack, template, pool)?;
    }
    Ok(())
}

fn synthesize_pool(stack: &Stack, template: &mut Template, pool: &ComputePool) -> Result<()> {
    let image_id = match &pool.machine_image {
        MachineImage::Ami(ami) => json!(ami),
        image => {
            let id = format!("{}ImageId", pool.id);
            let mut parameter = Parameter::new("AWS::SSM::Parameter::Value<AWS::EC2::Image::Id>")
                .with_description(format!("Machine image for {}", pool.id));
            if let Some(path) = image.ssm_parameter() {
                parameter = parameter.with_default(path);
            }
            template.add_parameter(&id, parameter)?;
            reference(&id)
        }
    };

    let profile_id = format!("{}InstanceProfile", pool.id);
    template.add_resource(
        &profile_id,
        Resource::new(
            "AWS::IAM::InstanceProfile",
            json!({ "Roles": [reference(&pool.role)] }),
        ),
    )?;

    let launch_template_id = format!("{}LaunchTemplate", pool.id);
    template.add_resource(
        &launch_template_id,
        Resource::new(
            "AWS::EC2::LaunchTemplate",
            json!({
                "LaunchTemplateData": {
                    "ImageId": image_id,
                    "InstanceType": pool.instance_type.to_string(),
                    "IamInstanceProfile": { "Arn": get_att(&profile_id, "Arn") },
                    "SecurityGroupIds": [get_att(&pool.security_group, "GroupId")],
                    "UserData": user_data(stack, pool),
                }
            }),
        ),
    )?;

    let target_groups: Vec<Value> = stack
        .load_balancers
        .iter()
        .flat_map(|lb| &lb.target_groups)
        .filter(|tg| tg.targets.iter().any(|t| *t == pool.id))
        .map(|tg| reference(&tg.id))
        .collect();

    let managed_termination = stack
        .clusters
        .iter()
        .filter_map(|c| c.capacity_provider.as_ref())
        .any(|cp| cp.compute == pool.id && cp.managed_termination_protection);

    let subnets = network::subnets(stack, template, pool.subnets)?;
    let capacity = pool.capacity;
    let mut properties = json!({
        "MinSize": capacity.min.to_string(),
        "MaxSize": capacity.max.to_string(),
        "DesiredCapacity": capacity.desired.to_string(),
        "LaunchTemplate": {
            "LaunchTemplateId": reference(&launch_template_id),
            "Version": get_att(&launch_template_id, "LatestVersionNumber"),
        },
        "VPCZoneIdentifier": subnets,
    });
    if !target_groups.is_empty() {
        properties["TargetGroupARNs"] = Value::Array(target_groups);
    }
    if managed_termination {
        // required by managed termination protection
        properties["NewInstancesProtectedFromScaleIn"] = json!(true);
    }

    template.add_resource(
        &pool.id,
        Resource::new("AWS::AutoScaling::AutoScalingGroup", properties),
    )
}

/// Boot script registering the instance with the cluster that uses this pool
fn user_data(stack: &Stack, pool: &ComputePool) -> Value {
    let cluster = stack.clusters.iter().find(|c| {
        c.capacity_provider
            .as_ref()
            .is_some_and(|cp| cp.compute == pool.id)
    });
    match cluster {
        Some(cluster) => base64(sub(&format!(
            "#!/bin/bash\necho ECS_CLUSTER=${{{}}} >> /etc/ecs/ecs.config\n",
            cluster.id
        ))),
        None => base64(json!("#!/bin/bash\n")),
    }
}
