//! Stack name rules

use crate::datastore::{StackStore, StoreError};
use crate::models::endpoint::EndpointId;
use crate::models::stack::StackId;

/// Lower-case the name and drop every character compose rejects in a project name
pub fn normalize_stack_name(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-' || *c == '_')
        .collect()
}

/// Whether no stack on `endpoint_id` other than `exclude` uses `name`, ignoring case
pub async fn is_unique_name<S>(
    store: &S,
    endpoint_id: EndpointId,
    name: &str,
    exclude: Option<StackId>,
) -> Result<bool, StoreError>
where
    S: StackStore + ?Sized,
{
    let stacks = store.stacks().await?;
    let taken = stacks.iter().any(|stack| {
        stack.endpoint_id == endpoint_id
            && Some(stack.id) != exclude
            && stack.name.eq_ignore_ascii_case(name)
    });
    Ok(!taken)
}
