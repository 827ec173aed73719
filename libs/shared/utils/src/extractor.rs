use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};

use shared_config::AppConfig;
use shared_models::auth::{User, UserRole};
use shared_models::error::AppError;

use crate::jwt::validate_token;

/// Authentication middleware: validates the bearer token and stores the
/// resulting `User` in request extensions.
pub async fn auth_middleware(
    State(config): State<Arc<AppConfig>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = request
        .headers()
        .get("Authorization")
        .ok_or_else(|| AppError::Auth("Missing authorization header".to_string()))?;

    let auth_value = auth_header
        .to_str()
        .map_err(|_| AppError::Auth("Invalid authorization header format".to_string()))?;

    if !auth_value.starts_with("Bearer ") {
        return Err(AppError::Auth("Invalid authorization header format".to_string()));
    }

    let token = &auth_value[7..];

    let user = validate_token(token, &config.supabase_jwt_secret).map_err(AppError::Auth)?;

    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

/// Extract the authenticated user placed in extensions by `auth_middleware`.
pub async fn extract_user<B>(request: &Request<B>) -> Result<User, AppError> {
    request
        .extensions()
        .get::<User>()
        .cloned()
        .ok_or_else(|| AppError::Auth("User not found in request extensions".to_string()))
}

/// Role guard with exhaustive matching over the closed role set.
///
/// A user with no parseable role is rejected outright.
pub fn require_role(user: &User, required: UserRole) -> Result<(), AppError> {
    let role = user
        .role
        .ok_or_else(|| AppError::Auth("No role assigned to user".to_string()))?;

    let allowed = match (role, required) {
        (UserRole::Admin, _) => true,
        (UserRole::Doctor, UserRole::Doctor) => true,
        (UserRole::Doctor, UserRole::Patient) => false,
        (UserRole::Doctor, UserRole::Admin) => false,
        (UserRole::Patient, UserRole::Patient) => true,
        (UserRole::Patient, UserRole::Doctor) => false,
        (UserRole::Patient, UserRole::Admin) => false,
    };

    if allowed {
        Ok(())
    } else {
        Err(AppError::Auth(format!(
            "Requires {} role",
            required
        )))
    }
}
