use std::ops::Deref;

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use db::models::user::User;
use deployment::Deployment;
use uuid::Uuid;

use crate::{DeploymentImpl, error::ApiError};

/// The authenticated caller, kept apart from `Extension<User>` which the
/// user loader fills for `/users/{id}` routes.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl Deref for CurrentUser {
    type Target = User;

    fn deref(&self) -> &User {
        &self.0
    }
}

fn request_token(req: &Request) -> Option<&str> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(utils_jwt::extract_bearer)
}

/// Resolves the bearer token to a stored user and exposes it as
/// `Extension<CurrentUser>` to every handler below this layer.
pub async fn require_api_auth(
    State(deployment): State<DeploymentImpl>,
    mut req: Request,
    next: Next,
) -> Response {
    let Some(token) = request_token(&req) else {
        tracing::debug!(path = %req.uri().path(), "Missing bearer token");
        return ApiError::Unauthorized.into_response();
    };

    let claims = match deployment.auth().verify_token(token) {
        Ok(claims) => claims,
        Err(err) => {
            tracing::warn!(
                path = %req.uri().path(),
                method = %req.method(),
                error = %err,
                "Rejected API token"
            );
            return ApiError::Unauthorized.into_response();
        }
    };

    // Roles are read from the database so role changes apply to live tokens.
    let user = match User::find_by_id(&deployment.db().pool, claims.sub).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            tracing::warn!(user_id = %claims.sub, "Token subject no longer exists");
            return ApiError::Unauthorized.into_response();
        }
        Err(err) => return ApiError::Database(err).into_response(),
    };

    req.extensions_mut().insert(CurrentUser(user));
    next.run(req).await
}

pub fn require_staff(user: &User) -> Result<(), ApiError> {
    if user.role.is_staff_or_admin() {
        Ok(())
    } else {
        Err(ApiError::Forbidden("Staff access required".to_string()))
    }
}

pub fn require_admin(user: &User) -> Result<(), ApiError> {
    if user.role == db::types::UserRole::Admin {
        Ok(())
    } else {
        Err(ApiError::Forbidden("Admin access required".to_string()))
    }
}

/// Customers may only touch their own records; staff and admins see all.
pub fn require_owner_or_staff(user: &User, owner_id: Uuid) -> Result<(), ApiError> {
    if user.id == owner_id || user.role.is_staff_or_admin() {
        Ok(())
    } else {
        Err(ApiError::Forbidden(
            "You do not have access to this resource".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use db::types::UserRole;

    use super::*;

    fn user_with(role: UserRole) -> User {
        User {
            id: Uuid::new_v4(),
            email: "someone@example.com".to_string(),
            full_name: "Someone".to_string(),
            phone: None,
            role,
            avatar_url: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn role_guards_follow_role_hierarchy() {
        let customer = user_with(UserRole::Customer);
        let staff = user_with(UserRole::Staff);
        let admin = user_with(UserRole::Admin);

        assert!(require_staff(&customer).is_err());
        assert!(require_staff(&staff).is_ok());
        assert!(require_staff(&admin).is_ok());
        assert!(require_admin(&staff).is_err());
        assert!(require_admin(&admin).is_ok());
    }

    #[test]
    fn owner_check_allows_self_and_staff_only() {
        let customer = user_with(UserRole::Customer);
        let staff = user_with(UserRole::Staff);

        assert!(require_owner_or_staff(&customer, customer.id).is_ok());
        assert!(require_owner_or_staff(&customer, Uuid::new_v4()).is_err());
        assert!(require_owner_or_staff(&staff, customer.id).is_ok());
    }
}
