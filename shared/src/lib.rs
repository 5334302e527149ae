pub mod types;
pub mod users;
pub mod predictions;
pub mod feedback;
pub mod webhook;

use aws_sdk_dynamodb::Client as DynamoClient;
use std::sync::Arc;

/// Shared application state
pub struct AppState {
    pub dynamo_client: DynamoClient,
}

impl AppState {
    pub fn new(dynamo_client: DynamoClient) -> Arc<Self> {
        Arc::new(Self { dynamo_client })
    }
}
