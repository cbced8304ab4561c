//! lampstack CloudFormation synthesis
//!
//! Turns a validated [`lampstack_core::Stack`] into a CloudFormation template
//! and inspects the result.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                  lamp CLI                        │
//! │        (lamp synth / validate / graph)           │
//! └─────────────────┬───────────────────────────────┘
//!                   │ Stack
//! ┌─────────────────▼───────────────────────────────┐
//! │                lampstack-cloud                   │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │  synth: network → security → compute     │   │
//! │  │         → ecs → load_balancer → dns      │   │
//! │  └──────────────────┬───────────────────────┘   │
//! │                     │ Template                  │
//! │  ┌──────────────┐  ┌▼─────────────┐            │
//! │  │    checks    │  │    graph     │            │
//! │  └──────────────┘  └──────────────┘            │
//! └─────────────────────────────────────────────────┘
//! ```

pub mod checks;
pub mod error;
pub mod graph;
pub mod intrinsic;
pub mod summary;
pub mod synth;
pub mod template;

// Re-exports
pub use checks::{Violation, verify};
pub use error::{CloudError, Result};
pub use graph::{ResourceGraph, ResourceNode};
pub use summary::TemplateSummary;
pub use synth::{ENVIRONMENT_METADATA, is_logical_id, synthesize};
pub use template::{Export, Parameter, Resource, Template, TemplateOutput};
