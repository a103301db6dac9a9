//! Authorization decisions

use std::collections::HashMap;

use crate::authn::context::RestrictedRequestContext;
use crate::models::endpoint::{
    Endpoint, TeamAccessPolicies, UserAccessPolicies, ENDPOINT_ADMIN_ROLE_ID,
};
use crate::models::registry::Registry;
use crate::models::resource_control::ResourceControl;
use crate::models::stack::Stack;

fn policies_grant(
    context: &RestrictedRequestContext,
    user_policies: &UserAccessPolicies,
    team_policies: &TeamAccessPolicies,
) -> bool {
    user_policies.contains_key(&context.user_id)
        || context.team_ids().any(|team| team_policies.contains_key(&team))
}

/// Whether the caller may operate on `endpoint` at all
pub fn authorized_endpoint_access(endpoint: &Endpoint, context: &RestrictedRequestContext) -> bool {
    context.is_admin
        || policies_grant(
            context,
            &endpoint.user_access_policies,
            &endpoint.team_access_policies,
        )
}

/// System administrators and endpoint administrators bypass the endpoint security
/// settings. Endpoint administration is granted through an access policy carrying the
/// endpoint administrator role, directly or through a team.
pub fn is_admin_or_endpoint_admin(context: &RestrictedRequestContext, endpoint: &Endpoint) -> bool {
    if context.is_admin {
        return true;
    }

    let user_is_endpoint_admin = endpoint
        .user_access_policies
        .get(&context.user_id)
        .is_some_and(|policy| policy.role_id == ENDPOINT_ADMIN_ROLE_ID);

    user_is_endpoint_admin
        || context.team_ids().any(|team| {
            endpoint
                .team_access_policies
                .get(&team)
                .is_some_and(|policy| policy.role_id == ENDPOINT_ADMIN_ROLE_ID)
        })
}

/// Registries the caller may pull from
pub fn filter_registries(
    registries: Vec<Registry>,
    context: &RestrictedRequestContext,
) -> Vec<Registry> {
    if context.is_admin {
        return registries;
    }

    registries
        .into_iter()
        .filter(|r| policies_grant(context, &r.user_access_policies, &r.team_access_policies))
        .collect()
}

/// Whether a resource control lets the caller see the resource
pub fn user_can_access_resource(
    resource_control: &ResourceControl,
    context: &RestrictedRequestContext,
) -> bool {
    if context.is_admin || resource_control.public {
        return true;
    }
    if resource_control.administrators_only {
        return false;
    }

    resource_control
        .user_accesses
        .iter()
        .any(|access| access.user_id == context.user_id)
        || resource_control
            .team_accesses
            .iter()
            .any(|access| context.team_ids().any(|team| team == access.team_id))
}

/// Attach each stack's resource control
pub fn decorate_stacks(stacks: Vec<Stack>, resource_controls: &[ResourceControl]) -> Vec<Stack> {
    let by_resource: HashMap<&str, &ResourceControl> = resource_controls
        .iter()
        .map(|rc| (rc.resource_id.as_str(), rc))
        .collect();

    stacks
        .into_iter()
        .map(|mut stack| {
            stack.resource_control = by_resource.get(stack.resource_id().as_str()).map(|rc| (*rc).clone());
            stack
        })
        .collect()
}

/// Keep the decorated stacks the caller may see. Stacks without a resource control are
/// visible to administrators only.
pub fn filter_authorized_stacks(stacks: Vec<Stack>, context: &RestrictedRequestContext) -> Vec<Stack> {
    if context.is_admin {
        return stacks;
    }

    stacks
        .into_iter()
        .filter(|stack| {
            stack
                .resource_control
                .as_ref()
                .is_some_and(|rc| user_can_access_resource(rc, context))
        })
        .collect()
}
