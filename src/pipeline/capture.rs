//! Copy response values into the variable environment

use serde_json::Value as JsonValue;
use tracing::debug;

use super::selector;
use super::template::Variables;
use super::testset::SetDirective;
use crate::errors::ApitestError;

/// Apply `directives` in order, stopping at the first one that cannot resolve.
///
/// Captured values keep their JSON type; they are rendered to text only when
/// a later placeholder uses them.
pub fn capture(
    directives: &[SetDirective],
    document: &JsonValue,
    variables: &mut Variables,
) -> Result<(), ApitestError> {
    for directive in directives {
        let value = selector::select(document, &directive.from).map_err(|source| {
            ApitestError::Capture {
                var: directive.var.clone(),
                from: directive.from.clone(),
                source,
            }
        })?;

        debug!(var = %directive.var, from = %directive.from, "captured variable");
        variables.insert(directive.var.clone(), value.clone());
    }

    Ok(())
}
