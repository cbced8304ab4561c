//! Route 53 alias records and stack outputs

use crate::error::Result;
use crate::intrinsic::{get_att, join, reference};
use crate::template::{Export, Parameter, Resource, Template, TemplateOutput};
use lampstack_core::{AliasTarget, OutputValue, Stack};
use serde_json::json;

pub(super) fn synthesize(stack: &Stack, template: &mut Template) -> Result<()> {
    for zone in &stack.hosted_zones {
        template.add_parameter(
            &zone.id,
            Parameter::new("AWS::Route53::HostedZone::Id")
                .with_description(format!("Existing hosted zone for {}", zone.zone_name))
                .with_default(zone.zone_id.clone()),
        )?;
    }

    for record in &stack.records {
        let AliasTarget::LoadBalancer(lb) = &record.target;
        template.add_resource(
            &record.id,
            Resource::new(
                "AWS::Route53::RecordSet",
                json!({
                    "HostedZoneId": reference(&record.zone),
                    "Name": record.fqdn(),
                    "Type": "A",
                    "AliasTarget": {
                        "DNSName": join("", vec![json!("dualstack."), get_att(lb, "DNSName")]),
                        "HostedZoneId": get_att(lb, "CanonicalHostedZoneID"),
                    },
                }),
            ),
        )?;
    }

    for output in &stack.outputs {
        let OutputValue::LoadBalancerDnsName(lb) = &output.value;
        template.add_output(
            &output.id,
            TemplateOutput {
                description: output.description.clone(),
                value: get_att(lb, "DNSName"),
                export: output.export_name.clone().map(|name| Export { name }),
            },
        )?;
    }
    Ok(())
}
