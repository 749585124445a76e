//! Bearer-token authentication and tenant resolution.
//!
//! Tokens are HS256 JWTs carrying a `user_id`. Superadmins act across tenants
//! and name the company they are working on through the token's `company_id`
//! claim; everyone else is bound to the company of their staff profile.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use dto::AuthClaims;
use jsonwebtoken::{decode, errors::ErrorKind, Algorithm, DecodingKey, Validation};
use models::User;

use crate::{error::ApiError, repository::UserRepository, state::AppState};

pub struct JwtVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;

        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn verify(&self, token: &str) -> Result<AuthClaims, ApiError> {
        decode::<AuthClaims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|err| match err.kind() {
                ErrorKind::ExpiredSignature => ApiError::unauthorized("Token has expired"),
                _ => {
                    tracing::debug!(error = %err, "jwt decode failed");
                    ApiError::unauthorized("Error decoding token")
                }
            })
    }
}

pub fn bearer_token(headers: &HeaderMap) -> Result<String, ApiError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or_else(|| ApiError::unauthorized("Authentication credentials were not provided."))?;

    value
        .to_str()
        .ok()
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(|token| token.to_string())
        .ok_or_else(|| ApiError::unauthorized("No token provided."))
}

/// An authenticated caller, extracted from the `Authorization` header.
#[derive(Debug, Clone)]
pub struct Principal {
    pub user: User,
    pub claims: AuthClaims,
}

impl Principal {
    /// The company this request acts on.
    pub async fn resolve_company(&self, users: &dyn UserRepository) -> Result<i64, ApiError> {
        if self.user.is_superuser {
            let company_id = self.claims.company_id.ok_or_else(|| {
                ApiError::rejected("Superadmin must specify a company ID in the token.")
            })?;
            if !users.company_exists(company_id).await? {
                return Err(ApiError::rejected("Company not found."));
            }
            return Ok(company_id);
        }

        self.user
            .company_id
            .ok_or_else(|| ApiError::rejected("Staff profile is not linked to a company."))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for Principal {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)?;
        let claims = state.verifier().verify(&token)?;

        let user = state
            .users()
            .find_user(claims.user_id)
            .await?
            .ok_or_else(|| ApiError::unauthorized("User not found"))?;

        if !user.is_active {
            return Err(ApiError::unauthorized("User is inactive"));
        }

        Ok(Principal { user, claims })
    }
}
