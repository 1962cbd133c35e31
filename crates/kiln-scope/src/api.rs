//! Read-only queries for embedding applications.

use kiln_types::BitId;

use crate::error::{OpContext, ScopeResult};
use crate::scope::Scope;
use crate::tag::LogEntry;

/// History of the component named by `id` (`[scope/]name[@version]`),
/// newest first.
pub fn get_component_logs(scope: &Scope, id: &str) -> ScopeResult<Vec<LogEntry>> {
    let parsed = BitId::parse(id).op_context("log", id)?;
    scope.log(&parsed)
}
