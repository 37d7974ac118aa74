// SPDX-FileCopyrightText: 2024 Softbear, Inc.
// SPDX-License-Identifier: LGPL-3.0-or-later

use super::config::AwsConfig;
use super::CognitoIdpClient;
use crate::common::{Error, KitConfig};
use aws_sdk_cognitoidentityprovider::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_cognitoidentityprovider::operation::initiate_auth::InitiateAuthOutput;
use aws_sdk_cognitoidentityprovider::types::{AttributeType, AuthFlowType, DeliveryMediumType};
use std::collections::HashMap;
use std::fmt::Debug;

/// A user created by [`CognitoClient::admin_create_user`].
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CreatedUser {
    /// User name.
    pub username: String,
    /// Status, e.g. `FORCE_CHANGE_PASSWORD`.
    pub status: Option<String>,
    /// Whether the user is enabled.
    pub enabled: bool,
    /// User attributes, e.g. `email`.
    pub attributes: HashMap<String, String>,
}

/// Tokens (or a challenge) returned by an authentication flow.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct AuthResult {
    /// Access token.
    pub access_token: Option<String>,
    /// ID token.
    pub id_token: Option<String>,
    /// Refresh token; absent from a refresh flow.
    pub refresh_token: Option<String>,
    /// Lifetime of the access token in seconds.
    pub expires_in: i32,
    /// Usually `Bearer`.
    pub token_type: Option<String>,
    /// Next challenge, e.g. `NEW_PASSWORD_REQUIRED`, instead of tokens.
    pub challenge_name: Option<String>,
    /// Session to answer the challenge with.
    pub session: Option<String>,
}

impl From<InitiateAuthOutput> for AuthResult {
    fn from(output: InitiateAuthOutput) -> Self {
        let mut result = match output.authentication_result() {
            Some(auth) => Self {
                access_token: auth.access_token().map(str::to_string),
                id_token: auth.id_token().map(str::to_string),
                refresh_token: auth.refresh_token().map(str::to_string),
                expires_in: auth.expires_in(),
                token_type: auth.token_type().map(str::to_string),
                ..Self::default()
            },
            None => Self::default(),
        };
        result.challenge_name = output.challenge_name().map(|c| c.as_str().to_string());
        result.session = output.session().map(str::to_string);
        result
    }
}

/// Cognito user pool operations.
#[derive(Clone, Debug)]
pub struct CognitoClient {
    client: CognitoIdpClient,
    pool_client_id: String,
    pool_id: String,
}

impl CognitoClient {
    /// Wraps `client` for the user pool `pool_id` and its app client `pool_client_id`.
    pub fn new(
        client: CognitoIdpClient,
        pool_client_id: impl Into<String>,
        pool_id: impl Into<String>,
    ) -> Self {
        Self {
            client,
            pool_client_id: pool_client_id.into(),
            pool_id: pool_id.into(),
        }
    }

    /// Reads pool ids from `COGNITO_POOL_CLIENT_ID`/`COGNITO_POOL_ID` or the `[aws]`
    /// section.
    pub fn from_config(client: CognitoIdpClient, config: &KitConfig) -> Result<Self, Error> {
        let AwsConfig {
            cognito_pool_id,
            cognito_pool_client_id,
            ..
        } = AwsConfig::load(config);
        let env = |key: &str, fallback: Option<String>| {
            std::env::var(key)
                .ok()
                .filter(|value| !value.is_empty())
                .or(fallback)
                .ok_or_else(|| Error::String(format!("{key} not set")))
        };
        Ok(Self::new(
            client,
            env("COGNITO_POOL_CLIENT_ID", cognito_pool_client_id)?,
            env("COGNITO_POOL_ID", cognito_pool_id)?,
        ))
    }

    /// Creates a user as an administrator. Cognito sends the invitation through
    /// `delivery_mediums`, e.g. `EMAIL`.
    pub async fn admin_create_user(
        &self,
        username: &str,
        attributes: &[(&str, &str)],
        delivery_mediums: &[&str],
    ) -> Result<CreatedUser, Error> {
        let context = || format!("admin_create_user(p={}, u={username})", self.pool_id);
        let mut user_attributes = Vec::with_capacity(attributes.len());
        for (name, value) in attributes {
            user_attributes.push(
                AttributeType::builder()
                    .name(*name)
                    .value(*value)
                    .build()
                    .map_err(|e| Error::String(format!("{}: {e}", context())))?,
            );
        }
        let output = self
            .client
            .admin_create_user()
            .user_pool_id(&self.pool_id)
            .username(username)
            .set_user_attributes(Some(user_attributes))
            .set_desired_delivery_mediums(Some(
                delivery_mediums
                    .iter()
                    .map(|medium| DeliveryMediumType::from(*medium))
                    .collect(),
            ))
            .send()
            .await
            .map_err(|e| map_cognito_error(e, context()))?;

        let user = output
            .user()
            .ok_or_else(|| Error::String(format!("{}: no user returned", context())))?;
        Ok(CreatedUser {
            username: user.username().unwrap_or(username).to_string(),
            status: user.user_status().map(|s| s.as_str().to_string()),
            enabled: user.enabled(),
            attributes: user
                .attributes()
                .iter()
                .map(|a| (a.name().to_string(), a.value().unwrap_or_default().to_string()))
                .collect(),
        })
    }

    /// Signs in with user name and password.
    pub async fn user_password_auth(
        &self,
        username: &str,
        password: &str,
    ) -> Result<AuthResult, Error> {
        self.client
            .initiate_auth()
            .auth_flow(AuthFlowType::UserPasswordAuth)
            .client_id(&self.pool_client_id)
            .auth_parameters("USERNAME", username)
            .auth_parameters("PASSWORD", password)
            .send()
            .await
            .map(AuthResult::from)
            .map_err(|e| map_cognito_error(e, format!("user_password_auth(u={username})")))
    }

    /// Exchanges a refresh token for new access and ID tokens.
    pub async fn refresh_token_auth(&self, refresh_token: &str) -> Result<AuthResult, Error> {
        self.client
            .initiate_auth()
            .auth_flow(AuthFlowType::RefreshTokenAuth)
            .client_id(&self.pool_client_id)
            .auth_parameters("REFRESH_TOKEN", refresh_token)
            .send()
            .await
            .map(AuthResult::from)
            .map_err(|e| map_cognito_error(e, "refresh_token_auth".to_string()))
    }
}

/// `NotAuthorizedException` becomes `Error::NotAuthorized`, anything else `Error::Anyhow`.
fn map_cognito_error<E, R>(error: SdkError<E, R>, context: String) -> Error
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: Debug + Send + Sync + 'static,
{
    if let Some(service_error) = error.as_service_error() {
        if service_error.code() == Some("NotAuthorizedException") {
            let message = service_error.message().unwrap_or("incorrect credentials");
            return Error::NotAuthorized(format!("{context}: {message}"));
        }
    }
    Error::Anyhow(error.into(), context)
}
