//! Stack synthesis
//!
//! Renders a validated [`Stack`] into a CloudFormation [`Template`].
//!
//! External identifiers (VPC, subnets, the instance role, hosted zones and
//! SSM-resolved machine images) become template parameters with the stack's
//! values as defaults. Everything else becomes a resource keyed by the stack's
//! logical id, or by `{owner}{Suffix}` for resources derived from one.

mod compute;
mod dns;
mod ecs;
mod load_balancer;
mod network;
mod security;

#[cfg(test)]
mod tests;

pub use network::{PRIVATE_SUBNETS_PARAMETER, PUBLIC_SUBNETS_PARAMETER, VPC_PARAMETER};

use crate::error::{CloudError, Result};
use crate::template::Template;
use lampstack_core::Stack;
use serde_json::{Map, Value};
use tracing::{info, instrument};

/// Metadata key carrying the target account and region
pub const ENVIRONMENT_METADATA: &str = "Lampstack::Environment";

/// Render a stack into a template
///
/// The stack is validated first; every issue is reported at once through
/// [`CloudError::Stack`].
#[instrument(skip(stack), fields(stack = %stack.name))]
pub fn synthesize(stack: &Stack) -> Result<Template> {
    lampstack_core::validate(stack)?;
    check_logical_ids(stack)?;

    let mut template = Template::new();
    template.description = stack.description.clone();
    if let Some(environment) = environment_metadata(stack) {
        template
            .metadata
            .insert(ENVIRONMENT_METADATA.to_string(), environment);
    }

    network::synthesize(stack, &mut template)?;
    security::synthesize(stack, &mut template)?;
    compute::synthesize(stack, &mut template)?;
    ecs::synthesize(stack, &mut template)?;
    load_balancer::synthesize(stack, &mut template)?;
    dns::synthesize(stack, &mut template)?;

    info!(
        parameters = template.parameters.len(),
        resources = template.resources.len(),
        outputs = template.outputs.len(),
        "Synthesis complete"
    );
    Ok(template)
}

/// CloudFormation logical ids are 1 to 255 ASCII alphanumerics
pub fn is_logical_id(id: &str) -> bool {
    !id.is_empty() && id.len() <= 255 && id.chars().all(|c| c.is_ascii_alphanumeric())
}

fn check_logical_ids(stack: &Stack) -> Result<()> {
    match stack
        .logical_ids()
        .into_iter()
        .find(|(_, id)| !is_logical_id(id))
    {
        Some((_, id)) => Err(CloudError::InvalidLogicalId(id.to_string())),
        None => Ok(()),
    }
}

fn environment_metadata(stack: &Stack) -> Option<Value> {
    let env = &stack.environment;
    let mut map = Map::new();
    if let Some(account) = &env.account {
        map.insert("Account".to_string(), Value::String(account.clone()));
    }
    if let Some(region) = &env.region {
        map.insert("Region".to_string(), Value::String(region.clone()));
    }
    (!map.is_empty()).then_some(Value::Object(map))
}

/// `mysql-container` → `MysqlContainer`
pub(crate) fn pascal_case(name: &str) -> String {
    name.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}
