//! Request security context

use crate::authn::token::TokenClaims;
use crate::datastore::UserStore;
use crate::errors::StackError;
use crate::models::user::{TeamId, TeamMembership, User, UserId};

/// Identity of the caller, resolved once per request
#[derive(Debug, Clone)]
pub struct RestrictedRequestContext {
    pub user_id: UserId,
    pub is_admin: bool,
    pub user_memberships: Vec<TeamMembership>,
}

impl RestrictedRequestContext {
    /// Build the context from verified token claims. The stored user is authoritative
    /// for the admin flag.
    pub async fn resolve<S>(claims: &TokenClaims, store: &S) -> Result<Self, StackError>
    where
        S: UserStore + ?Sized,
    {
        let user = store.user(claims.id).await.map_err(|e| {
            if e.is_not_found() {
                StackError::Unauthorized("Invalid user identifier in token".to_string())
            } else {
                StackError::persistence("Unable to load user information from the database", e)
            }
        })?;

        let user_memberships = store.team_memberships_by_user(user.id).await.map_err(|e| {
            StackError::persistence("Unable to retrieve user team memberships", e)
        })?;

        Ok(Self::for_user(&user, user_memberships))
    }

    pub fn for_user(user: &User, user_memberships: Vec<TeamMembership>) -> Self {
        Self {
            user_id: user.id,
            is_admin: user.is_admin(),
            user_memberships,
        }
    }

    pub fn team_ids(&self) -> impl Iterator<Item = TeamId> + '_ {
        self.user_memberships.iter().map(|m| m.team_id)
    }
}
