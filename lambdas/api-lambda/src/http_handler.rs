use lambda_http::{
    http::{Method, StatusCode},
    Body, Error, Request, Response,
};
use mavuno_shared::{feedback, predictions, users, webhook, AppState};
use std::env;
use std::sync::Arc;

/// Main Lambda handler - routes webhook deliveries and CRUD calls
pub(crate) async fn function_handler(
    event: Request,
    state: Arc<AppState>,
) -> Result<Response<Body>, Error> {
    let method = event.method();
    let path = event.uri().path();
    let body = event.body();
    tracing::info!("API Lambda invoked - Method: {} Path: {}", method, path);

    // Handle CORS preflight
    if method == "OPTIONS" {
        return Ok(Response::builder()
            .status(StatusCode::OK)
            .header("Access-Control-Allow-Origin", "*")
            .header("Access-Control-Allow-Methods", "GET,POST,OPTIONS")
            .header(
                "Access-Control-Allow-Headers",
                "Content-Type,svix-id,svix-timestamp,svix-signature",
            )
            .body(Body::Empty)
            .map_err(Box::new)?);
    }

    let table_name = env::var("TABLE_NAME").unwrap_or_else(|_| "mavuno".to_string());

    // Identity-provider webhook (signature-verified, no JWT)
    if path == "/clerk-webhook" {
        if method != &Method::POST {
            return method_not_allowed();
        }
        let secret = env::var("CLERK_WEBHOOK_SECRET").ok();
        return webhook::handle_clerk_webhook(
            &state.dynamo_client,
            &table_name,
            secret.as_deref(),
            event.headers(),
            body,
        )
        .await;
    }

    let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    // Users routes
    if path.starts_with("/users") {
        return match (method, parts.as_slice()) {
            // POST /users/sync - upsert a user from identity-provider data
            (&Method::POST, ["users", "sync"]) => {
                users::sync_user(&state.dynamo_client, &table_name, body).await
            }
            // GET /users - list all users
            (&Method::GET, ["users"]) => {
                users::list_users(&state.dynamo_client, &table_name).await
            }
            // GET /users/{clerk_id} - get user by identity id
            (&Method::GET, ["users", clerk_id]) => {
                users::get_user(&state.dynamo_client, &table_name, clerk_id).await
            }
            // GET /users/{user_id}/predictions - list a user's predictions
            (&Method::GET, ["users", user_id, "predictions"]) => {
                predictions::list_user_predictions(&state.dynamo_client, &table_name, user_id)
                    .await
            }
            _ => not_found(),
        };
    }

    // Predictions routes
    if path.starts_with("/predictions") {
        return match (method, parts.as_slice()) {
            // POST /predictions - record a prediction
            (&Method::POST, ["predictions"]) => {
                predictions::add_prediction(&state.dynamo_client, &table_name, body).await
            }
            // GET /predictions/{id}/feedback - list feedback for a prediction
            (&Method::GET, ["predictions", prediction_id, "feedback"]) => {
                feedback::list_prediction_feedback(
                    &state.dynamo_client,
                    &table_name,
                    prediction_id,
                )
                .await
            }
            // POST /predictions/{id}/feedback - submit feedback
            (&Method::POST, ["predictions", prediction_id, "feedback"]) => {
                feedback::submit_feedback(
                    &state.dynamo_client,
                    &table_name,
                    prediction_id,
                    body,
                )
                .await
            }
            _ => not_found(),
        };
    }

    // No matching route
    tracing::warn!("No route matched - Method: {} Path: {}", method, path);
    not_found()
}

fn not_found() -> Result<Response<Body>, Error> {
    Ok(Response::builder()
        .status(StatusCode::NOT_FOUND)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(serde_json::json!({"error": "Not found"}).to_string().into())
        .map_err(Box::new)?)
}

fn method_not_allowed() -> Result<Response<Body>, Error> {
    Ok(Response::builder()
        .status(StatusCode::METHOD_NOT_ALLOWED)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(
            serde_json::json!({"error": "Method not allowed"})
                .to_string()
                .into(),
        )
        .map_err(Box::new)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_dynamodb::Client as DynamoClient;
    use lambda_http::http::Request as HttpRequest;

    fn test_state() -> Arc<AppState> {
        let config = aws_sdk_dynamodb::Config::builder()
            .behavior_version(aws_sdk_dynamodb::config::BehaviorVersion::latest())
            .build();
        AppState::new(DynamoClient::from_conf(config))
    }

    #[tokio::test]
    async fn unknown_route_returns_404() {
        let request = HttpRequest::builder()
            .method("GET")
            .uri("/nope")
            .body(Body::Empty)
            .unwrap();

        let response = function_handler(request, test_state()).await.unwrap();
        assert_eq!(response.status(), 404);
    }

    #[tokio::test]
    async fn preflight_is_acknowledged() {
        let request = HttpRequest::builder()
            .method("OPTIONS")
            .uri("/users")
            .body(Body::Empty)
            .unwrap();

        let response = function_handler(request, test_state()).await.unwrap();
        assert_eq!(response.status(), 200);
    }

    #[tokio::test]
    async fn webhook_only_accepts_post() {
        let request = HttpRequest::builder()
            .method("GET")
            .uri("/clerk-webhook")
            .body(Body::Empty)
            .unwrap();

        let response = function_handler(request, test_state()).await.unwrap();
        assert_eq!(response.status(), 405);
    }

    #[tokio::test]
    async fn webhook_secret_and_header_failures_map_to_status_codes() {
        // Sequential on purpose: both cases read the same env var.
        env::remove_var("CLERK_WEBHOOK_SECRET");
        let request = HttpRequest::builder()
            .method("POST")
            .uri("/clerk-webhook")
            .body(Body::from("{}"))
            .unwrap();
        let response = function_handler(request, test_state()).await.unwrap();
        assert_eq!(response.status(), 500);

        env::set_var("CLERK_WEBHOOK_SECRET", "whsec_dGVzdA==");
        let request = HttpRequest::builder()
            .method("POST")
            .uri("/clerk-webhook")
            .body(Body::from("{}"))
            .unwrap();
        let response = function_handler(request, test_state()).await.unwrap();
        assert_eq!(response.status(), 400);
        env::remove_var("CLERK_WEBHOOK_SECRET");
    }
}
