//! Existing VPC and subnets as parameters

use crate::error::Result;
use crate::intrinsic::reference;
use crate::template::{Parameter, Template};
use lampstack_core::{Stack, SubnetSelection};
use serde_json::Value;

pub const VPC_PARAMETER: &str = "VpcId";
pub const PUBLIC_SUBNETS_PARAMETER: &str = "PublicSubnetIds";
pub const PRIVATE_SUBNETS_PARAMETER: &str = "PrivateSubnetIds";

pub(super) fn synthesize(stack: &Stack, template: &mut Template) -> Result<()> {
    template.add_parameter(
        VPC_PARAMETER,
        Parameter::new("AWS::EC2::VPC::Id")
            .with_description("Existing VPC")
            .with_default(stack.network.vpc_id.clone()),
    )
}

pub(super) fn vpc() -> Value {
    reference(VPC_PARAMETER)
}

/// Declare the subnet list parameter for `selection` and return a `Ref` to it
///
/// Without known subnet ids the parameter has no default and must be supplied
/// at deploy time.
pub(super) fn subnets(
    stack: &Stack,
    template: &mut Template,
    selection: SubnetSelection,
) -> Result<Value> {
    let (id, description) = match selection {
        SubnetSelection::Public => (PUBLIC_SUBNETS_PARAMETER, "Public subnets of the VPC"),
        SubnetSelection::Private => (PRIVATE_SUBNETS_PARAMETER, "Private subnets of the VPC"),
    };

    let mut parameter =
        Parameter::new("List<AWS::EC2::Subnet::Id>").with_description(description);
    let ids = stack.network.subnets(selection);
    if !ids.is_empty() {
        parameter = parameter.with_default(ids.join(","));
    }

    template.add_parameter(id, parameter)?;
    Ok(reference(id))
}
