// SPDX-FileCopyrightText: 2024 Softbear, Inc.
// SPDX-License-Identifier: AGPL-3.0-or-later

/// A wrapper around Cognito identity provider client.
mod cognito;
/// AWS configuration and client construction.
mod config;
/// A wrapper around Dynamo DB client.
mod dynamo;
/// Normalization of Dynamo DB errors.
mod errors;
/// Typed reads from Dynamo DB items.
mod ext;
/// A wrapper around Secrets Manager client.
mod secrets;
/// HTTP sessions stored in Dynamo DB.
mod session;
/// A wrapper around SSM client.
mod ssm;
/// Unit tests.
mod tests;

pub use crate::aws::cognito::{AuthResult, CognitoClient, CreatedUser};
pub use crate::aws::config::{
    create_aws_config_loader, ddb_table_name, load_aws_config, new_cognito_client,
    new_ddb_client, new_secrets_client, new_ssm_client, secret_name, CognitoIdpClient,
    DynamoDbClient, SecretsManagerClient, SsmClient, AWS_MAX_ATTEMPTS, AWS_TIMEOUT,
};
pub use crate::aws::dynamo::{
    batch_write_ddb_items, build_update_expression, create_ddb_item, delete_ddb_item,
    entity_key, get_ddb_item, put_ddb_item, query_ddb, to_dynamo_av, to_dynamo_item,
    transact_write_ddb_items, update_ddb_item, UpdateField, BATCH_WRITE_LIMIT,
};
pub use crate::aws::errors::{
    CancelReason, DbError, DynamoErrorHandler, ErrorMap, ErrorResponse,
    ProvideCancellationReasons,
};
pub use crate::aws::ext::AttributeValuesExt;
pub use crate::aws::secrets::SecretsManager;
pub use crate::aws::session::{Session, SessionService, SESSION_TYPE};
pub use crate::aws::ssm::ParameterStore;
