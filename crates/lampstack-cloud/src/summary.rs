//! Template summary for CLI output

use crate::template::Template;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Counts of what a template declares
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TemplateSummary {
    pub parameters: usize,
    pub resources: usize,
    pub outputs: usize,
    /// Resource count per CloudFormation type
    pub by_type: BTreeMap<String, usize>,
}

impl TemplateSummary {
    pub fn of(template: &Template) -> Self {
        let mut by_type = BTreeMap::new();
        for resource in template.resources.values() {
            *by_type.entry(resource.resource_type.clone()).or_insert(0) += 1;
        }
        Self {
            parameters: template.parameters.len(),
            resources: template.resources.len(),
            outputs: template.outputs.len(),
            by_type,
        }
    }
}

impl Template {
    pub fn summary(&self) -> TemplateSummary {
        TemplateSummary::of(self)
    }
}

impl fmt::Display for TemplateSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} resources, {} parameters, {} outputs",
            self.resources, self.parameters, self.outputs
        )
    }
}
