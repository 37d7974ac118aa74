// SPDX-FileCopyrightText: 2024 Softbear, Inc.
// SPDX-License-Identifier: LGPL-3.0-or-later

use crate::common::{Error, KitConfig};
use aws_config::profile::ProfileFileRegionProvider;
use aws_config::retry::RetryConfig;
use aws_config::timeout::TimeoutConfig;
use aws_config::{BehaviorVersion, ConfigLoader, Region, SdkConfig};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// A convenient alias for Dynamo DB client so consuming code doesn't need to add it to `Cargo.toml`
pub type DynamoDbClient = aws_sdk_dynamodb::Client;
/// A convenient alias for Cognito client so consuming code doesn't need to add it to `Cargo.toml`
pub type CognitoIdpClient = aws_sdk_cognitoidentityprovider::Client;
/// A convenient alias for Secrets Manager client so consuming code doesn't need to add it to `Cargo.toml`
pub type SecretsManagerClient = aws_sdk_secretsmanager::Client;
/// A convenient alias for SSM client so consuming code doesn't need to add it to `Cargo.toml`
pub type SsmClient = aws_sdk_ssm::Client;

/// Connect and read timeout of every SDK call.
pub const AWS_TIMEOUT: Duration = Duration::from_millis(4900);
/// Attempts the SDK makes before giving up, including the first.
pub const AWS_MAX_ATTEMPTS: u32 = 2;

/// The `[aws]` section of the configuration; every key is optional.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct AwsConfig {
    pub profile: Option<String>,
    pub region: Option<String>,
    pub dynamodb_endpoint: Option<String>,
    pub dynamodb_table: Option<String>,
    pub secret_name: Option<String>,
    pub cognito_pool_id: Option<String>,
    pub cognito_pool_client_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ConfigToml {
    #[serde(default)]
    pub aws: AwsConfig,
}

impl AwsConfig {
    pub(crate) fn load(config: &KitConfig) -> Self {
        config
            .get::<ConfigToml>()
            .map(|toml| toml.aws)
            .unwrap_or_default()
    }
}

/// Create an AWS config loader with profile, region, timeouts and retries.
pub fn create_aws_config_loader(config: &KitConfig) -> ConfigLoader {
    let AwsConfig {
        profile, region, ..
    } = AwsConfig::load(config);
    let mut config_loader = aws_config::defaults(BehaviorVersion::latest())
        .timeout_config(
            TimeoutConfig::builder()
                .connect_timeout(AWS_TIMEOUT)
                .read_timeout(AWS_TIMEOUT)
                .build(),
        )
        .retry_config(RetryConfig::standard().with_max_attempts(AWS_MAX_ATTEMPTS));
    if let Some(profile_name) = profile {
        if config.debug() {
            debug!("AWS using profile name {profile_name}");
        }
        let region = ProfileFileRegionProvider::builder()
            .profile_name(&profile_name)
            .build();
        config_loader = config_loader.profile_name(&profile_name).region(region)
    }
    if let Some(region) = region {
        config_loader = config_loader.region(Region::new(region));
    }
    config_loader
}

/// Load AWS configuration with profile and region.
pub async fn load_aws_config(config: &KitConfig) -> SdkConfig {
    create_aws_config_loader(config).load().await
}

/// Creates a Dynamo DB client. `DDB_ENDPOINT` (or `aws.dynamodb_endpoint`) points it at a
/// local Dynamo DB.
pub async fn new_ddb_client(config: &KitConfig) -> DynamoDbClient {
    let sdk_config = load_aws_config(config).await;
    let mut builder = aws_sdk_dynamodb::config::Builder::from(&sdk_config);
    if let Some(endpoint) = config.env_or("DDB_ENDPOINT", |toml: ConfigToml| {
        toml.aws.dynamodb_endpoint
    }) {
        debug!("Dynamo DB endpoint {endpoint}");
        builder = builder.endpoint_url(endpoint);
    }
    DynamoDbClient::from_conf(builder.build())
}

/// Creates a Cognito identity provider client.
pub async fn new_cognito_client(config: &KitConfig) -> CognitoIdpClient {
    CognitoIdpClient::new(&load_aws_config(config).await)
}

/// Creates a Secrets Manager client.
pub async fn new_secrets_client(config: &KitConfig) -> SecretsManagerClient {
    SecretsManagerClient::new(&load_aws_config(config).await)
}

/// Creates an SSM client.
pub async fn new_ssm_client(config: &KitConfig) -> SsmClient {
    SsmClient::new(&load_aws_config(config).await)
}

/// Table name from `AWS_DYNAMO_DB_TABLE_NAME` or `aws.dynamodb_table`.
pub fn ddb_table_name(config: &KitConfig) -> Result<String, Error> {
    config
        .env_or("AWS_DYNAMO_DB_TABLE_NAME", |toml: ConfigToml| {
            toml.aws.dynamodb_table
        })
        .ok_or_else(|| Error::String("AWS_DYNAMO_DB_TABLE_NAME not set".to_string()))
}

/// Secret name from `AWS_SECRET_NAME` or `aws.secret_name`.
pub fn secret_name(config: &KitConfig) -> Result<String, Error> {
    config
        .env_or("AWS_SECRET_NAME", |toml: ConfigToml| toml.aws.secret_name)
        .ok_or_else(|| Error::Secret("AWS_SECRET_NAME not set".to_string()))
}
