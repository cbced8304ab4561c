//! lampstack core
//!
//! スタック定義のモデル、KDLパーサー、テンプレート展開、検証を提供します。
//!
//! ```text
//! stack.kdl ─┐
//! resources/ ├─ discovery ─ template (tera) ─ parser ─ Stack ─ validate
//! .env ──────┘
//! ```
//!
//! 組み込みのLAMP構成は [`blueprint`] から直接組み立てることもできます。

pub mod blueprint;
pub mod discovery;
pub mod error;
pub mod loader;
pub mod model;
pub mod parser;
pub mod secret;
pub mod template;
pub mod validate;

pub use blueprint::{LampOptions, lamp_stack, render_kdl};
pub use discovery::{DiscoveredFiles, discover_files, discover_files_with_stage, find_project_root};
pub use error::{Result, StackError};
pub use loader::{load_project_from_root, load_project_from_root_with_stage};
pub use model::*;
pub use parser::{parse_kdl_file, parse_kdl_string};
pub use secret::SecretRef;
pub use validate::{ValidationIssue, validate};
