use aws_sdk_dynamodb::{types::AttributeValue, Client as DynamoClient};
use lambda_http::{http::StatusCode, Body, Error, Response};
use serde::Serialize;
use std::collections::HashMap;

use crate::types::{SyncUserRequest, User, UserRole};

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

/// What a sync has to do once the stored profile (if any) is known.
#[derive(Debug, PartialEq)]
pub enum SyncAction {
    /// Profile exists and nothing needs to change.
    Skip,
    /// Profile exists and only the role differs.
    UpdateRole(UserRole),
    /// No profile yet; insert one with this role.
    Insert(UserRole),
}

/// Re-syncing an existing user never overwrites profile fields; the only
/// permitted update is a role change, and only when one was requested.
pub fn plan_sync(existing: Option<&User>, requested_role: Option<UserRole>) -> SyncAction {
    match existing {
        Some(user) => match requested_role {
            Some(role) if role != user.role => SyncAction::UpdateRole(role),
            _ => SyncAction::Skip,
        },
        None => SyncAction::Insert(requested_role.unwrap_or_default()),
    }
}

/// Look up a user profile by its identity-provider id
pub async fn find_user(
    client: &DynamoClient,
    table_name: &str,
    clerk_id: &str,
) -> Result<Option<User>, Error> {
    let pk = format!("USER#{}", clerk_id);

    let result = client
        .get_item()
        .table_name(table_name)
        .key("PK", AttributeValue::S(pk))
        .key("SK", AttributeValue::S("PROFILE".to_string()))
        .send()
        .await?;

    Ok(result.item().and_then(user_from_item))
}

/// Idempotent upsert of a user record keyed by the identity-provider id.
///
/// Returns the record when this call created it, `None` when the profile
/// already existed (whether or not the role was patched). Safe to retry.
pub async fn sync_user_record(
    client: &DynamoClient,
    table_name: &str,
    req: &SyncUserRequest,
) -> Result<Option<User>, Error> {
    let existing = find_user(client, table_name, &req.clerk_id).await?;

    match plan_sync(existing.as_ref(), req.role) {
        SyncAction::Skip => Ok(None),
        SyncAction::UpdateRole(role) => {
            let pk = format!("USER#{}", req.clerk_id);
            client
                .update_item()
                .table_name(table_name)
                .key("PK", AttributeValue::S(pk))
                .key("SK", AttributeValue::S("PROFILE".to_string()))
                .update_expression("SET #role = :role")
                .expression_attribute_names("#role", "role")
                .expression_attribute_values(":role", AttributeValue::S(role.as_str().to_string()))
                .send()
                .await?;

            tracing::info!("Updated role to {} for user {}", role.as_str(), req.clerk_id);
            Ok(None)
        }
        SyncAction::Insert(role) => {
            let now = chrono::Utc::now().to_rfc3339();
            let pk = format!("USER#{}", req.clerk_id);

            let mut put_request = client
                .put_item()
                .table_name(table_name)
                .item("PK", AttributeValue::S(pk))
                .item("SK", AttributeValue::S("PROFILE".to_string()))
                .item("clerk_id", AttributeValue::S(req.clerk_id.clone()))
                .item("name", AttributeValue::S(req.name.clone()))
                .item("username", AttributeValue::S(req.username.clone()))
                .item("email", AttributeValue::S(req.email.clone()))
                .item("phone", AttributeValue::S(req.phone.clone()))
                .item("location", AttributeValue::S(req.location.clone()))
                .item("role", AttributeValue::S(role.as_str().to_string()))
                .item("created_at", AttributeValue::S(now.clone()))
                // The key is the uniqueness constraint: a concurrent sync for
                // the same clerk_id must not overwrite the winner's insert.
                .condition_expression("attribute_not_exists(PK)");

            if let Some(image) = &req.image {
                put_request = put_request.item("image", AttributeValue::S(image.clone()));
            }

            if let Err(err) = put_request.send().await {
                let lost_race = err
                    .as_service_error()
                    .map(|e| e.is_conditional_check_failed_exception())
                    .unwrap_or(false);
                if !lost_race {
                    return Err(err.into());
                }
                tracing::info!("User {} already created by a concurrent sync", req.clerk_id);
                return Ok(None);
            }

            Ok(Some(User {
                clerk_id: req.clerk_id.clone(),
                name: req.name.clone(),
                username: req.username.clone(),
                email: req.email.clone(),
                phone: req.phone.clone(),
                location: req.location.clone(),
                role,
                image: req.image.clone(),
                created_at: now,
            }))
        }
    }
}

/// POST /users/sync - create or update a user from identity-provider data
pub async fn sync_user(
    client: &DynamoClient,
    table_name: &str,
    body: &[u8],
) -> Result<Response<Body>, Error> {
    let req: SyncUserRequest = match serde_json::from_slice(body) {
        Ok(req) => req,
        Err(e) => {
            tracing::error!("Failed to parse sync request body: {}", e);
            let error = ErrorResponse {
                error: "InvalidRequest".to_string(),
                message: format!("Invalid request body: {}", e),
            };
            return Ok(Response::builder()
                .status(StatusCode::BAD_REQUEST)
                .header("Content-Type", "application/json")
                .header("Access-Control-Allow-Origin", "*")
                .body(serde_json::to_string(&error)?.into())
                .map_err(Box::new)?);
        }
    };

    match sync_user_record(client, table_name, &req).await? {
        Some(user) => Ok(Response::builder()
            .status(StatusCode::CREATED)
            .header("Content-Type", "application/json")
            .header("Access-Control-Allow-Origin", "*")
            .body(serde_json::to_string(&user)?.into())
            .map_err(Box::new)?),
        None => Ok(Response::builder()
            .status(StatusCode::OK)
            .header("Content-Type", "application/json")
            .header("Access-Control-Allow-Origin", "*")
            .body(
                serde_json::json!({"message": "User already synced"})
                    .to_string()
                    .into(),
            )
            .map_err(Box::new)?),
    }
}

/// GET /users - list all user profiles
pub async fn list_users(client: &DynamoClient, table_name: &str) -> Result<Response<Body>, Error> {
    let mut users: Vec<User> = Vec::new();
    let mut last_key: Option<HashMap<String, AttributeValue>> = None;

    loop {
        let mut request = client
            .scan()
            .table_name(table_name)
            .filter_expression("SK = :profile")
            .expression_attribute_values(":profile", AttributeValue::S("PROFILE".to_string()));
        if let Some(key) = last_key.take() {
            request = request.set_exclusive_start_key(Some(key));
        }

        let result = request.send().await?;

        for item in result.items() {
            if let Some(user) = user_from_item(item) {
                users.push(user);
            }
        }

        match result.last_evaluated_key() {
            Some(key) if !key.is_empty() => last_key = Some(key.clone()),
            _ => break,
        }
    }

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(serde_json::to_string(&users)?.into())
        .map_err(Box::new)?)
}

/// GET /users/{clerk_id} - fetch a single user by identity-provider id
pub async fn get_user(
    client: &DynamoClient,
    table_name: &str,
    clerk_id: &str,
) -> Result<Response<Body>, Error> {
    match find_user(client, table_name, clerk_id).await? {
        Some(user) => Ok(Response::builder()
            .status(StatusCode::OK)
            .header("Content-Type", "application/json")
            .header("Access-Control-Allow-Origin", "*")
            .body(serde_json::to_string(&user)?.into())
            .map_err(Box::new)?),
        None => Ok(Response::builder()
            .status(StatusCode::NOT_FOUND)
            .header("Content-Type", "application/json")
            .header("Access-Control-Allow-Origin", "*")
            .body(serde_json::json!({"error": "User not found"}).to_string().into())
            .map_err(Box::new)?),
    }
}

fn user_from_item(item: &HashMap<String, AttributeValue>) -> Option<User> {
    let clerk_id = item.get("clerk_id").and_then(|v| v.as_s().ok())?.to_string();

    Some(User {
        clerk_id,
        name: item.get("name").and_then(|v| v.as_s().ok()).map(|s| s.to_string()).unwrap_or_default(),
        username: item.get("username").and_then(|v| v.as_s().ok()).map(|s| s.to_string()).unwrap_or_default(),
        email: item.get("email").and_then(|v| v.as_s().ok()).map(|s| s.to_string()).unwrap_or_default(),
        phone: item.get("phone").and_then(|v| v.as_s().ok()).map(|s| s.to_string()).unwrap_or_default(),
        location: item.get("location").and_then(|v| v.as_s().ok()).map(|s| s.to_string()).unwrap_or_default(),
        role: UserRole::from_attr(item.get("role").and_then(|v| v.as_s().ok()).map(|s| s.as_str()).unwrap_or("user")),
        image: item.get("image").and_then(|v| v.as_s().ok()).map(|s| s.to_string()),
        created_at: item.get("created_at").and_then(|v| v.as_s().ok()).map(|s| s.to_string()).unwrap_or_default(),
    })
}
