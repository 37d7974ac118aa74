// SPDX-FileCopyrightText: 2024 Softbear, Inc.
// SPDX-License-Identifier: LGPL-3.0-or-later

#[cfg(test)]
mod aws_tests {
    use crate::aws::secrets::parse_secret_string;
    use crate::aws::{
        build_update_expression, entity_key, AttributeValuesExt, CancelReason, DbError,
        DynamoErrorHandler, ErrorMap, ErrorResponse, Session, UpdateField,
    };
    use crate::common::{build_lambda_response, Error};
    use aws_sdk_dynamodb::primitives::Blob;
    use aws_sdk_dynamodb::types::AttributeValue;
    use hyper::StatusCode;
    use std::collections::HashMap;

    fn s(value: &str) -> AttributeValue {
        AttributeValue::S(value.to_string())
    }

    fn reason(code: &str) -> CancelReason {
        CancelReason {
            code: Some(code.to_string()),
            message: None,
        }
    }

    #[test]
    fn update_expression() {
        let fields = [
            UpdateField::set_once("ab", "Ab", s("a")),
            UpdateField::new("gh", "Gh", s("g")),
            UpdateField::set_once("yu", "Yu", s("y")),
        ];
        assert_eq!(
            build_update_expression(&fields),
            "SET #gh = :gh, #ab = if_not_exists(#ab, :ab), #yu = if_not_exists(#yu, :yu)"
        );
    }

    #[test]
    fn entity_keys() {
        assert_eq!(entity_key("SESSION", "1234"), "SESSION#1234");
        assert_eq!(Session::key("abc"), "SESSION#abc");
    }

    #[test]
    fn top_level_code_is_mapped() {
        let handler = DynamoErrorHandler::default();
        let response = ErrorResponse {
            code: Some("ConditionalCheckFailedException".to_string()),
            message: Some("The conditional request failed".to_string()),
            cancellation_reasons: Vec::new(),
        };
        assert_eq!(
            handler.normalize(&response),
            Some(DbError::ConditionCheckFailed)
        );

        let response = ErrorResponse {
            code: Some("SomethingNew".to_string()),
            ..Default::default()
        };
        assert_eq!(handler.normalize(&response), None);
        assert_eq!(handler.normalize(&ErrorResponse::default()), None);
    }

    #[test]
    fn cancellation_reasons_pair_with_maps() {
        let handler = DynamoErrorHandler::default().with_cancellation_maps(vec![
            ErrorMap::new().with(
                "ConditionalCheckFailed",
                DbError::Custom("UserExists".to_string()),
            ),
            ErrorMap::new().with(
                "ConditionalCheckFailed",
                DbError::Custom("EmailTaken".to_string()),
            ),
        ]);
        let response = ErrorResponse {
            code: Some("TransactionCanceledException".to_string()),
            message: None,
            cancellation_reasons: vec![reason("None"), reason("ConditionalCheckFailed")],
        };
        assert_eq!(
            handler.normalize(&response),
            Some(DbError::Custom("EmailTaken".to_string()))
        );

        // First failing item wins.
        let response = ErrorResponse {
            cancellation_reasons: vec![
                reason("ConditionalCheckFailed"),
                reason("ConditionalCheckFailed"),
            ],
            ..response
        };
        assert_eq!(
            handler.normalize(&response),
            Some(DbError::Custom("UserExists".to_string()))
        );
    }

    #[test]
    fn unmatched_reasons_fall_back_to_top_level_code() {
        let maps = vec![ErrorMap::cancellation_defaults()];
        let response = ErrorResponse {
            code: Some("TransactionCanceledException".to_string()),
            message: None,
            cancellation_reasons: vec![reason("None"), reason("TransactionConflict")],
        };

        // The second reason has no map.
        let handler = DynamoErrorHandler::default().with_cancellation_maps(maps.clone());
        assert_eq!(handler.normalize(&response), None);

        let handler = DynamoErrorHandler::new(ErrorMap::client_defaults().with(
            "TransactionCanceledException",
            DbError::Custom("Cancelled".to_string()),
        ))
        .with_cancellation_maps(maps);
        assert_eq!(
            handler.normalize(&response),
            Some(DbError::Custom("Cancelled".to_string()))
        );
    }

    #[test]
    fn db_error_display() {
        let e = Error::Db(DbError::ConditionCheckFailed, "put_item(t=T)".to_string());
        assert_eq!(e.name(), "ConditionCheckFailed");
        assert_eq!(e.to_string(), "put_item(t=T): conditional check failed");

        let e = Error::Db(DbError::Custom("UserExists".to_string()), "tx".to_string());
        assert_eq!(e.name(), "UserExists");
        assert_eq!(e.to_string(), "tx: UserExists");
    }

    #[test]
    fn custom_db_error_names_response() {
        let e = Error::Db(DbError::Custom("UserExists".to_string()), "tx".to_string());
        let response = build_lambda_response(StatusCode::BAD_REQUEST, None, Some(&e));
        assert_eq!(response["body"], r#"{"error":"UserExists: tx: UserExists"}"#);
    }

    #[test]
    fn attribute_values() {
        let mut item = HashMap::new();
        item.insert("id".to_string(), s("foo"));
        item.insert("n".to_string(), AttributeValue::N("42".to_string()));
        item.insert("f".to_string(), AttributeValue::N("4.2".to_string()));
        item.insert(
            "b".to_string(),
            AttributeValue::B(Blob::new(b"bytes".to_vec())),
        );
        assert_eq!(item.get_s("id"), Some("foo"));
        assert_eq!(item.get_s("n"), None);
        assert_eq!(item.get_n("n"), Some(42));
        assert_eq!(item.get_n("f"), None);
        assert_eq!(item.get_b("b"), Some(&b"bytes"[..]));
        assert_eq!(item.get_b("missing"), None);
    }

    #[test]
    fn session_item_round_trip() {
        let session = Session {
            pk: Session::key("abc"),
            sk: Session::key("abc"),
            ty: "SESSION".to_string(),
            session_id: "abc".to_string(),
            base64_cookies: Some(b"W10=".to_vec()),
            created_at: Some("2003-09-05T15:33:28+00:00".to_string()),
            created_by: None,
            modified_at: Some("2003-09-05T15:33:28+00:00".to_string()),
            modified_by: Some("worker".to_string()),
            expires_at: Some(1078328008),
        };
        let item = session.to_item();
        assert!(!item.contains_key("CreatedBy"));
        assert_eq!(item.get_n("ExpiresAt"), Some(1078328008));
        assert_eq!(Session::from_item(&item).unwrap(), session);
    }

    #[test]
    fn projected_session_item() {
        let mut item = HashMap::new();
        item.insert("PK".to_string(), s("SESSION#abc"));
        item.insert("Type".to_string(), s("SESSION"));
        item.insert(
            "Base64Cookies".to_string(),
            AttributeValue::B(Blob::new(b"W10=".to_vec())),
        );
        let session = Session::from_item(&item).unwrap();
        assert_eq!(session.session_id, "abc");
        assert_eq!(session.sk, "SESSION#abc");
        assert_eq!(session.base64_cookies.as_deref(), Some(&b"W10="[..]));
        assert_eq!(session.expires_at, None);

        assert!(Session::from_item(&HashMap::new()).is_err());
    }

    #[test]
    fn secret_string() {
        let secrets =
            parse_secret_string(r#"{"PROXY_USERNAME": "user", "PROXY_PORT": 8080}"#).unwrap();
        assert_eq!(secrets["PROXY_USERNAME"], "user");
        assert_eq!(secrets["PROXY_PORT"], "8080");
        assert!(parse_secret_string("not json").is_err());
    }
}

#[cfg(test)]
mod aws_mock_tests {
    use crate::aws::{
        batch_write_ddb_items, create_ddb_item, get_ddb_item, put_ddb_item,
        transact_write_ddb_items, AuthResult, CognitoClient, CreatedUser, DbError,
        DynamoErrorHandler, ErrorMap, ParameterStore, SecretsManager, SessionService,
    };
    use crate::common::Error;
    use crate::retry::RetryPolicy;
    use aws_sdk_cognitoidentityprovider::operation::initiate_auth::{
        InitiateAuthError, InitiateAuthOutput,
    };
    use aws_sdk_cognitoidentityprovider::operation::admin_create_user::AdminCreateUserOutput;
    use aws_sdk_cognitoidentityprovider::types::error::NotAuthorizedException;
    use aws_sdk_cognitoidentityprovider::types::{
        AttributeType, AuthFlowType, AuthenticationResultType, UserStatusType, UserType,
    };
    use aws_sdk_dynamodb::error::ErrorMetadata;
    use aws_sdk_dynamodb::operation::batch_write_item::BatchWriteItemOutput;
    use aws_sdk_dynamodb::operation::get_item::GetItemOutput;
    use aws_sdk_dynamodb::operation::put_item::{PutItemError, PutItemOutput};
    use aws_sdk_dynamodb::operation::transact_write_items::TransactWriteItemsError;
    use aws_sdk_dynamodb::operation::update_item::UpdateItemOutput;
    use aws_sdk_dynamodb::types::error::{
        ConditionalCheckFailedException, TransactionCanceledException,
    };
    use aws_sdk_dynamodb::types::{
        AttributeValue, CancellationReason, Put, PutRequest, ReturnValue, TransactWriteItem,
        WriteRequest,
    };
    use aws_sdk_dynamodb::Client;
    use aws_sdk_secretsmanager::operation::get_secret_value::GetSecretValueOutput;
    use aws_sdk_ssm::operation::get_parameter::{GetParameterError, GetParameterOutput};
    use aws_sdk_ssm::types::error::ParameterNotFound;
    use aws_sdk_ssm::types::Parameter;
    use aws_smithy_mocks::{mock, mock_client, RuleMode};
    use serde::{Deserialize, Serialize};
    use std::collections::HashMap;
    use std::time::Duration;

    #[derive(Debug, Deserialize, Serialize, PartialEq)]
    struct User {
        #[serde(rename = "PK")]
        pk: String,
        name: String,
    }

    #[derive(Serialize)]
    struct Key<'a> {
        #[serde(rename = "PK")]
        pk: &'a str,
    }

    fn s(value: &str) -> AttributeValue {
        AttributeValue::S(value.to_string())
    }

    fn user_item() -> HashMap<String, AttributeValue> {
        let mut item = HashMap::new();
        item.insert("PK".to_string(), s("USER#1"));
        item.insert("name".to_string(), s("Ada"));
        item
    }

    fn conditional_check_failed() -> PutItemError {
        PutItemError::ConditionalCheckFailedException(
            ConditionalCheckFailedException::builder()
                .message("The conditional request failed")
                .meta(
                    ErrorMetadata::builder()
                        .code("ConditionalCheckFailedException")
                        .message("The conditional request failed")
                        .build(),
                )
                .build(),
        )
    }

    #[tokio::test]
    async fn get_item_deserializes() {
        let rule = mock!(Client::get_item)
            .match_requests(|req| req.table_name() == Some("Users"))
            .then_output(|| GetItemOutput::builder().set_item(Some(user_item())).build());
        let client = mock_client!(aws_sdk_dynamodb, &[&rule]);

        let user: Option<User> = get_ddb_item(
            &client,
            &DynamoErrorHandler::default(),
            "Users",
            Key { pk: "USER#1" },
        )
        .await
        .unwrap();
        assert_eq!(
            user,
            Some(User {
                pk: "USER#1".to_string(),
                name: "Ada".to_string()
            })
        );
    }

    #[tokio::test]
    async fn missing_item_is_none() {
        let rule = mock!(Client::get_item)
            .then_output(|| GetItemOutput::builder().build());
        let client = mock_client!(aws_sdk_dynamodb, &[&rule]);

        let user: Option<User> = get_ddb_item(
            &client,
            &DynamoErrorHandler::default(),
            "Users",
            Key { pk: "USER#2" },
        )
        .await
        .unwrap();
        assert_eq!(user, None);
    }

    #[tokio::test]
    async fn conditional_create_is_normalized() {
        let rule = mock!(Client::put_item)
            .match_requests(|req| {
                req.condition_expression() == Some("attribute_not_exists(#hn)")
            })
            .then_error(conditional_check_failed);
        let client = mock_client!(aws_sdk_dynamodb, &[&rule]);

        let result = create_ddb_item(
            &client,
            &DynamoErrorHandler::default(),
            "Users",
            User {
                pk: "USER#1".to_string(),
                name: "Ada".to_string(),
            },
            "PK",
        )
        .await;
        match result {
            Err(Error::Db(DbError::ConditionCheckFailed, context)) => {
                assert_eq!(context, "create_item(t=Users, h=PK)")
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn unmapped_error_passes_through() {
        let rule = mock!(Client::put_item)
            .then_error(|| {
                PutItemError::generic(
                    ErrorMetadata::builder()
                        .code("SomethingNew")
                        .message("never seen before")
                        .build(),
                )
            });
        let client = mock_client!(aws_sdk_dynamodb, &[&rule]);

        let result = put_ddb_item(
            &client,
            &DynamoErrorHandler::new(ErrorMap::new()),
            "Users",
            User {
                pk: "USER#1".to_string(),
                name: "Ada".to_string(),
            },
        )
        .await;
        match result {
            Err(e @ Error::Dynamo(..)) => assert_eq!(e.name(), "DynamoDBError"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn cancelled_transaction_maps_reason() {
        let rule = mock!(Client::transact_write_items)
            .then_error(|| {
                TransactWriteItemsError::TransactionCanceledException(
                    TransactionCanceledException::builder()
                        .set_cancellation_reasons(Some(vec![
                            CancellationReason::builder().code("None").build(),
                            CancellationReason::builder()
                                .code("ConditionalCheckFailed")
                                .message("The conditional request failed")
                                .build(),
                        ]))
                        .meta(
                            ErrorMetadata::builder()
                                .code("TransactionCanceledException")
                                .build(),
                        )
                        .build(),
                )
            });
        let client = mock_client!(aws_sdk_dynamodb, &[&rule]);

        let put = |pk: &str| {
            let mut item = HashMap::new();
            item.insert("PK".to_string(), s(pk));
            TransactWriteItem::builder()
                .put(
                    Put::builder()
                        .table_name("Users")
                        .set_item(Some(item))
                        .condition_expression("attribute_not_exists(PK)")
                        .build()
                        .unwrap(),
                )
                .build()
        };
        let result = transact_write_ddb_items(
            &client,
            &DynamoErrorHandler::default(),
            vec![put("USER#1"), put("EMAIL#ada@example.com")],
            vec![
                ErrorMap::new().with(
                    "ConditionalCheckFailed",
                    DbError::Custom("UserExists".to_string()),
                ),
                ErrorMap::new().with(
                    "ConditionalCheckFailed",
                    DbError::Custom("EmailTaken".to_string()),
                ),
            ],
        )
        .await;
        match result {
            Err(Error::Db(DbError::Custom(kind), _)) => assert_eq!(kind, "EmailTaken"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn batch_write_resubmits_unprocessed_items() {
        let unprocessed = mock!(Client::batch_write_item)
            .match_requests(|req| {
                req.request_items()
                    .and_then(|items| items.get("Users"))
                    .map(|requests| requests.len())
                    == Some(3)
            })
            .then_output(|| {
                let mut item = HashMap::new();
                item.insert("PK".to_string(), s("USER#2"));
                item.insert("name".to_string(), s("Bob"));
                BatchWriteItemOutput::builder()
                    .unprocessed_items(
                        "Users",
                        vec![WriteRequest::builder()
                            .put_request(PutRequest::builder().set_item(Some(item)).build().unwrap())
                            .build()],
                    )
                    .build()
            });
        let processed = mock!(Client::batch_write_item)
            .match_requests(|req| {
                req.request_items()
                    .and_then(|items| items.get("Users"))
                    .map(|requests| requests.len())
                    == Some(1)
            })
            .then_output(|| BatchWriteItemOutput::builder().build());
        let client = mock_client!(
            aws_sdk_dynamodb,
            RuleMode::Sequential,
            &[&unprocessed, &processed]
        );

        let users = ["Ada", "Bob", "Cy"]
            .iter()
            .enumerate()
            .map(|(i, name)| User {
                pk: format!("USER#{}", i + 1),
                name: name.to_string(),
            })
            .collect();
        batch_write_ddb_items(
            &client,
            &DynamoErrorHandler::default(),
            "Users",
            users,
            &RetryPolicy::new(3, Duration::ZERO, 2.0, Duration::ZERO),
        )
        .await
        .unwrap();
        assert_eq!(unprocessed.num_calls(), 1);
        assert_eq!(processed.num_calls(), 1);
    }

    #[tokio::test]
    async fn get_or_create_session_sets_once() {
        let rule = mock!(Client::update_item)
            .match_requests(|req| {
                req.update_expression()
                    == Some(
                        "SET #ty = :ty, #si = :si, #ma = :ma, \
                         #ca = if_not_exists(#ca, :ca), #ea = if_not_exists(#ea, :ea)",
                    )
                    && req.return_values() == Some(&ReturnValue::AllNew)
                    && req
                        .key()
                        .and_then(|key| key.get("PK"))
                        .and_then(|pk| pk.as_s().ok())
                        .map(String::as_str)
                        == Some("SESSION#abc")
            })
            .then_output(|| {
                let mut attributes = HashMap::new();
                attributes.insert("PK".to_string(), s("SESSION#abc"));
                attributes.insert("SK".to_string(), s("SESSION#abc"));
                attributes.insert("Type".to_string(), s("SESSION"));
                attributes.insert("SessionId".to_string(), s("abc"));
                attributes.insert("CreatedAt".to_string(), s("2003-09-05T15:33:28+00:00"));
                attributes.insert("ModifiedAt".to_string(), s("2003-09-06T15:33:28+00:00"));
                attributes.insert(
                    "ExpiresAt".to_string(),
                    AttributeValue::N("1078328008".to_string()),
                );
                UpdateItemOutput::builder()
                    .set_attributes(Some(attributes))
                    .build()
            });
        let client = mock_client!(aws_sdk_dynamodb, &[&rule]);

        let session = SessionService::new(client, "Sessions")
            .get_or_create_session("abc")
            .await
            .unwrap();
        assert_eq!(session.session_id, "abc");
        assert_eq!(session.created_at.as_deref(), Some("2003-09-05T15:33:28+00:00"));
        assert_eq!(session.expires_at, Some(1078328008));
        assert_eq!(session.base64_cookies, None);
    }

    #[tokio::test]
    async fn cookies_are_updated() {
        let rule = mock!(Client::update_item)
            .match_requests(|req| {
                req.update_expression() == Some("SET #b64 = :b64, #mda = :mda")
                    && req
                        .expression_attribute_values()
                        .and_then(|values| values.get(":b64"))
                        .and_then(|value| value.as_b().ok())
                        .map(|blob| blob.as_ref() == b"W10=")
                        .unwrap_or(false)
            })
            .then_output(|| {
                let mut attributes = HashMap::new();
                attributes.insert("PK".to_string(), s("SESSION#abc"));
                attributes.insert(
                    "Base64Cookies".to_string(),
                    AttributeValue::B(aws_sdk_dynamodb::primitives::Blob::new(b"W10=".to_vec())),
                );
                UpdateItemOutput::builder()
                    .set_attributes(Some(attributes))
                    .build()
            });
        let client = mock_client!(aws_sdk_dynamodb, &[&rule]);

        let session = SessionService::new(client, "Sessions")
            .update_session_cookies("abc", b"W10=".to_vec())
            .await
            .unwrap();
        assert_eq!(session.base64_cookies.as_deref(), Some(&b"W10="[..]));
    }

    #[tokio::test]
    async fn cognito_password_auth() {
        let rule = mock!(aws_sdk_cognitoidentityprovider::Client::initiate_auth)
            .match_requests(|req| {
                req.auth_parameters()
                    .and_then(|params| params.get("USERNAME"))
                    .map(String::as_str)
                    == Some("ada")
            })
            .then_output(|| {
                InitiateAuthOutput::builder()
                    .authentication_result(
                        AuthenticationResultType::builder()
                            .access_token("access")
                            .id_token("id")
                            .refresh_token("refresh")
                            .expires_in(3600)
                            .token_type("Bearer")
                            .build(),
                    )
                    .build()
            });
        let client = mock_client!(aws_sdk_cognitoidentityprovider, &[&rule]);

        let result = CognitoClient::new(client, "app-client", "us-east-1_pool")
            .user_password_auth("ada", "hunter2")
            .await
            .unwrap();
        assert_eq!(
            result,
            AuthResult {
                access_token: Some("access".to_string()),
                id_token: Some("id".to_string()),
                refresh_token: Some("refresh".to_string()),
                expires_in: 3600,
                token_type: Some("Bearer".to_string()),
                challenge_name: None,
                session: None,
            }
        );
    }

    #[tokio::test]
    async fn cognito_rejects_bad_password() {
        let rule = mock!(aws_sdk_cognitoidentityprovider::Client::initiate_auth)
            .then_error(|| {
                InitiateAuthError::NotAuthorizedException(
                    NotAuthorizedException::builder()
                        .message("Incorrect username or password.")
                        .meta(
                            aws_sdk_cognitoidentityprovider::error::ErrorMetadata::builder()
                                .code("NotAuthorizedException")
                                .message("Incorrect username or password.")
                                .build(),
                        )
                        .build(),
                )
            });
        let client = mock_client!(aws_sdk_cognitoidentityprovider, &[&rule]);

        let result = CognitoClient::new(client, "app-client", "us-east-1_pool")
            .user_password_auth("ada", "wrong")
            .await;
        match result {
            Err(Error::NotAuthorized(message)) => {
                assert!(message.ends_with("Incorrect username or password."), "{message}")
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn put_session_never_expires() {
        let rule = mock!(Client::put_item)
            .match_requests(|req| {
                req.table_name() == Some("Sessions")
                    && req.item().is_some_and(|item| {
                        item.contains_key("Base64Cookies") && !item.contains_key("ExpiresAt")
                    })
            })
            .then_output(|| PutItemOutput::builder().build());
        let client = mock_client!(aws_sdk_dynamodb, &[&rule]);

        let session = SessionService::new(client, "Sessions")
            .put_session_item("abc", b"W10=".to_vec())
            .await
            .unwrap();
        assert_eq!(session.expires_at, None);
        assert_eq!(session.pk, "SESSION#abc");
        assert_eq!(rule.num_calls(), 1);
    }

    #[tokio::test]
    async fn cognito_admin_create_user() {
        let rule = mock!(aws_sdk_cognitoidentityprovider::Client::admin_create_user)
            .match_requests(|req| {
                req.user_pool_id() == Some("us-east-1_pool") && req.username() == Some("ada")
            })
            .then_output(|| {
                AdminCreateUserOutput::builder()
                    .user(
                        UserType::builder()
                            .username("ada")
                            .user_status(UserStatusType::ForceChangePassword)
                            .enabled(true)
                            .attributes(
                                AttributeType::builder()
                                    .name("email")
                                    .value("ada@example.com")
                                    .build()
                                    .unwrap(),
                            )
                            .build(),
                    )
                    .build()
            });
        let client = mock_client!(aws_sdk_cognitoidentityprovider, &[&rule]);

        let user = CognitoClient::new(client, "app-client", "us-east-1_pool")
            .admin_create_user("ada", &[("email", "ada@example.com")], &["EMAIL"])
            .await
            .unwrap();
        assert_eq!(
            user,
            CreatedUser {
                username: "ada".to_string(),
                status: Some("FORCE_CHANGE_PASSWORD".to_string()),
                enabled: true,
                attributes: HashMap::from([(
                    "email".to_string(),
                    "ada@example.com".to_string()
                )]),
            }
        );
        assert_eq!(rule.num_calls(), 1);
    }

    #[tokio::test]
    async fn cognito_refresh_token_auth() {
        let rule = mock!(aws_sdk_cognitoidentityprovider::Client::initiate_auth)
            .match_requests(|req| {
                req.auth_flow() == Some(&AuthFlowType::RefreshTokenAuth)
                    && req.client_id() == Some("app-client")
                    && req
                        .auth_parameters()
                        .and_then(|params| params.get("REFRESH_TOKEN"))
                        .map(String::as_str)
                        == Some("refresh")
            })
            .then_output(|| {
                InitiateAuthOutput::builder()
                    .authentication_result(
                        AuthenticationResultType::builder()
                            .access_token("access2")
                            .id_token("id2")
                            .expires_in(3600)
                            .token_type("Bearer")
                            .build(),
                    )
                    .build()
            });
        let client = mock_client!(aws_sdk_cognitoidentityprovider, &[&rule]);

        let result = CognitoClient::new(client, "app-client", "us-east-1_pool")
            .refresh_token_auth("refresh")
            .await
            .unwrap();
        assert_eq!(result.access_token.as_deref(), Some("access2"));
        assert_eq!(result.id_token.as_deref(), Some("id2"));
        assert_eq!(result.refresh_token, None);
        assert_eq!(rule.num_calls(), 1);
    }

    #[tokio::test]
    async fn secret_fetched_once() {
        let rule = mock!(aws_sdk_secretsmanager::Client::get_secret_value)
            .match_requests(|req| req.secret_id() == Some("lambkin/test"))
            .then_output(|| {
                GetSecretValueOutput::builder()
                    .secret_string(r#"{"LAMBKIN_TEST_API_KEY": "k1", "LAMBKIN_TEST_PORT": 8080}"#)
                    .build()
            });
        let client = mock_client!(aws_sdk_secretsmanager, RuleMode::MatchAny, &[&rule]);
        let secrets = SecretsManager::new(client, "lambkin/test");

        assert_eq!(secrets.get_secret("LAMBKIN_TEST_API_KEY").await.unwrap(), "k1");
        assert_eq!(secrets.get_secret("LAMBKIN_TEST_PORT").await.unwrap(), "8080");
        match secrets.get_secret("LAMBKIN_TEST_NO_SUCH_KEY").await {
            Err(Error::Secret(message)) => {
                assert_eq!(message, "LAMBKIN_TEST_NO_SUCH_KEY not found")
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(rule.num_calls(), 1);
    }

    #[tokio::test]
    async fn secret_env_wins() {
        std::env::set_var("LAMBKIN_TEST_SECRET_FROM_ENV", "from-env");
        let rule = mock!(aws_sdk_secretsmanager::Client::get_secret_value)
            .then_output(|| GetSecretValueOutput::builder().secret_string("{}").build());
        let client = mock_client!(aws_sdk_secretsmanager, RuleMode::MatchAny, &[&rule]);

        let value = SecretsManager::new(client, "lambkin/test")
            .get_secret("LAMBKIN_TEST_SECRET_FROM_ENV")
            .await
            .unwrap();
        assert_eq!(value, "from-env");
        assert_eq!(rule.num_calls(), 0);
    }

    fn parameter_output(name: &str, value: &str) -> GetParameterOutput {
        GetParameterOutput::builder()
            .parameter(Parameter::builder().name(name).value(value).build())
            .build()
    }

    #[tokio::test]
    async fn parameter_cached_per_name() {
        let db_url = mock!(aws_sdk_ssm::Client::get_parameter)
            .match_requests(|req| {
                req.name() == Some("LAMBKIN_TEST_DB_URL") && req.with_decryption() == Some(true)
            })
            .then_output(|| parameter_output("LAMBKIN_TEST_DB_URL", "postgres://db"));
        let token = mock!(aws_sdk_ssm::Client::get_parameter)
            .match_requests(|req| req.name() == Some("LAMBKIN_TEST_TOKEN"))
            .then_output(|| parameter_output("LAMBKIN_TEST_TOKEN", "t0k3n"));
        let client = mock_client!(aws_sdk_ssm, RuleMode::MatchAny, &[&db_url, &token]);
        let store = ParameterStore::new(client);

        for _ in 0..2 {
            assert_eq!(
                store.get_secret("LAMBKIN_TEST_DB_URL").await.unwrap(),
                "postgres://db"
            );
        }
        assert_eq!(store.get_secret("LAMBKIN_TEST_TOKEN").await.unwrap(), "t0k3n");
        assert_eq!(db_url.num_calls(), 1);
        assert_eq!(token.num_calls(), 1);
    }

    #[tokio::test]
    async fn parameter_env_wins() {
        std::env::set_var("LAMBKIN_TEST_PARAMETER_FROM_ENV", "from-env");
        let rule = mock!(aws_sdk_ssm::Client::get_parameter)
            .then_output(|| parameter_output("LAMBKIN_TEST_PARAMETER_FROM_ENV", "from-ssm"));
        let client = mock_client!(aws_sdk_ssm, RuleMode::MatchAny, &[&rule]);

        let value = ParameterStore::new(client)
            .get_secret("LAMBKIN_TEST_PARAMETER_FROM_ENV")
            .await
            .unwrap();
        assert_eq!(value, "from-env");
        assert_eq!(rule.num_calls(), 0);
    }

    #[tokio::test]
    async fn missing_parameter_is_secret_error() {
        let rule = mock!(aws_sdk_ssm::Client::get_parameter).then_error(|| {
            GetParameterError::ParameterNotFound(
                ParameterNotFound::builder()
                    .meta(
                        aws_sdk_ssm::error::ErrorMetadata::builder()
                            .code("ParameterNotFound")
                            .build(),
                    )
                    .build(),
            )
        });
        let client = mock_client!(aws_sdk_ssm, &[&rule]);

        match ParameterStore::new(client)
            .get_secret("LAMBKIN_TEST_NO_SUCH_PARAMETER")
            .await
        {
            Err(Error::Secret(message)) => {
                assert_eq!(message, "LAMBKIN_TEST_NO_SUCH_PARAMETER not found")
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
