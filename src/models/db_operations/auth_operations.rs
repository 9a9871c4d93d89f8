use crate::models::db_operations::baas_client::{expect_success, read_json, BaasClient, BaasError};
use crate::models::{AuthSession, AuthUser, TokenGrant};
use reqwest::Method;
use serde_json::{json, Value};

/// Lifetime assumed for link tokens that arrive without `expires_in`.
pub const DEFAULT_LINK_TOKEN_TTL_SECS: i64 = 3600;

pub async fn sign_in_with_password(
    client: &BaasClient,
    email: &str,
    password: &str,
) -> Result<TokenGrant, BaasError> {
    let response = client
        .request(Method::POST, "auth/v1/token", None)
        .query(&[("grant_type", "password")])
        .json(&json!({ "email": email.trim(), "password": password }))
        .send()
        .await?;
    read_json(response).await
}

/// Registers a new account. Projects without e-mail confirmation answer with a
/// session straight away, which is returned so the caller can sign the user in.
pub async fn sign_up(
    client: &BaasClient,
    email: &str,
    password: &str,
    full_name: &str,
    username: &str,
    redirect_to: &str,
) -> Result<Option<TokenGrant>, BaasError> {
    let response = client
        .request(Method::POST, "auth/v1/signup", None)
        .query(&[("redirect_to", redirect_to)])
        .json(&json!({
            "email": email.trim(),
            "password": password,
            "data": { "full_name": full_name.trim(), "username": username.trim() }
        }))
        .send()
        .await?;
    let body: Value = read_json(response).await?;
    Ok(serde_json::from_value::<TokenGrant>(body).ok())
}

pub async fn sign_out(client: &BaasClient, access_token: &str) -> Result<(), BaasError> {
    let response = client
        .request(Method::POST, "auth/v1/logout", Some(access_token))
        .send()
        .await?;
    expect_success(response).await
}

pub async fn request_password_reset(
    client: &BaasClient,
    email: &str,
    redirect_to: &str,
) -> Result<(), BaasError> {
    let response = client
        .request(Method::POST, "auth/v1/recover", None)
        .query(&[("redirect_to", redirect_to)])
        .json(&json!({ "email": email.trim() }))
        .send()
        .await?;
    expect_success(response).await
}

pub async fn update_password(
    client: &BaasClient,
    access_token: &str,
    password: &str,
) -> Result<(), BaasError> {
    let response = client
        .request(Method::PUT, "auth/v1/user", Some(access_token))
        .json(&json!({ "password": password }))
        .send()
        .await?;
    expect_success(response).await
}

pub async fn refresh(client: &BaasClient, refresh_token: &str) -> Result<TokenGrant, BaasError> {
    let response = client
        .request(Method::POST, "auth/v1/token", None)
        .query(&[("grant_type", "refresh_token")])
        .json(&json!({ "refresh_token": refresh_token }))
        .send()
        .await?;
    read_json(response).await
}

pub async fn get_user(client: &BaasClient, access_token: &str) -> Result<AuthUser, BaasError> {
    let response = client
        .request(Method::GET, "auth/v1/user", Some(access_token))
        .send()
        .await?;
    read_json(response).await
}

/// Builds a session from the tokens carried by a confirmation or recovery link.
/// The access token is checked against the auth service before it is trusted.
pub async fn establish_from_link(
    client: &BaasClient,
    access_token: &str,
    refresh_token: &str,
    expires_in: Option<i64>,
    now: i64,
) -> Result<AuthSession, BaasError> {
    if access_token.trim().is_empty() {
        return Err(BaasError::MissingSession);
    }
    let user = get_user(client, access_token).await?;
    let grant = TokenGrant {
        access_token: access_token.to_string(),
        refresh_token: refresh_token.to_string(),
        expires_in: expires_in.filter(|s| *s > 0).unwrap_or(DEFAULT_LINK_TOKEN_TTL_SECS),
        user,
    };
    Ok(AuthSession::from_grant(grant, now))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn token_grant_parses_gotrue_session() {
        let body = json!({
            "access_token": "jwt",
            "token_type": "bearer",
            "expires_in": 3600,
            "expires_at": 1_700_000_000,
            "refresh_token": "r1",
            "user": { "id": "0b5b2c1e-7b5e-4f0c-8f4b-8f9a1d2c3e4f", "email": "maker@example.com", "role": "authenticated" }
        });
        let grant: TokenGrant = serde_json::from_value(body).unwrap();
        assert_eq!(grant.refresh_token, "r1");
        assert_eq!(grant.user.email.as_deref(), Some("maker@example.com"));
    }

    #[test]
    fn signup_without_session_is_not_a_grant() {
        let body = json!({ "id": "0b5b2c1e-7b5e-4f0c-8f4b-8f9a1d2c3e4f", "email": "maker@example.com" });
        assert!(serde_json::from_value::<TokenGrant>(body).is_err());
    }

    #[actix_web::test]
    async fn empty_link_token_is_rejected_locally() {
        let client = BaasClient::new("http://localhost:54321", "anon").unwrap();
        let err = establish_from_link(&client, " ", "r", None, 0).await.unwrap_err();
        assert!(matches!(err, BaasError::MissingSession));
    }
}
