use aws_sdk_dynamodb::{types::AttributeValue, Client as DynamoClient};
use lambda_http::{http::StatusCode, Body, Error, Response};
use std::collections::HashMap;

use crate::types::{Feedback, SubmitFeedbackRequest};

/// POST /predictions/{prediction_id}/feedback - attach feedback to a prediction
///
/// The accuracy rating is stored as sent; bounds are the UI's concern.
pub async fn submit_feedback(
    client: &DynamoClient,
    table_name: &str,
    prediction_id: &str,
    body: &[u8],
) -> Result<Response<Body>, Error> {
    let req: SubmitFeedbackRequest = match serde_json::from_slice(body) {
        Ok(req) => req,
        Err(e) => {
            tracing::error!("Failed to parse feedback body: {}", e);
            return Ok(Response::builder()
                .status(StatusCode::BAD_REQUEST)
                .header("Content-Type", "application/json")
                .header("Access-Control-Allow-Origin", "*")
                .body(
                    serde_json::json!({"error": format!("Invalid request body: {}", e)})
                        .to_string()
                        .into(),
                )
                .map_err(Box::new)?);
        }
    };

    let feedback_id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();
    let pk = format!("PREDICTION#{}", prediction_id);
    let sk = format!("FEEDBACK#{}", feedback_id);

    let mut put_request = client
        .put_item()
        .table_name(table_name)
        .item("PK", AttributeValue::S(pk))
        .item("SK", AttributeValue::S(sk))
        .item("user_id", AttributeValue::S(req.user_id.clone()))
        .item(
            "accuracy_rating",
            AttributeValue::N(req.accuracy_rating.to_string()),
        )
        .item("created_at", AttributeValue::S(now.clone()));

    if let Some(comment) = &req.comment {
        put_request = put_request.item("comment", AttributeValue::S(comment.clone()));
    }
    if let Some(actual_yield) = &req.actual_yield {
        put_request = put_request.item("actual_yield", AttributeValue::S(actual_yield.clone()));
    }

    put_request.send().await?;

    let feedback = Feedback {
        feedback_id,
        prediction_id: prediction_id.to_string(),
        user_id: req.user_id,
        accuracy_rating: req.accuracy_rating,
        comment: req.comment,
        actual_yield: req.actual_yield,
        created_at: now,
    };

    Ok(Response::builder()
        .status(StatusCode::CREATED)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(serde_json::to_string(&feedback)?.into())
        .map_err(Box::new)?)
}

/// GET /predictions/{prediction_id}/feedback - list feedback for a prediction
pub async fn list_prediction_feedback(
    client: &DynamoClient,
    table_name: &str,
    prediction_id: &str,
) -> Result<Response<Body>, Error> {
    let pk = format!("PREDICTION#{}", prediction_id);

    let result = client
        .query()
        .table_name(table_name)
        .key_condition_expression("PK = :pk AND begins_with(SK, :sk_prefix)")
        .expression_attribute_values(":pk", AttributeValue::S(pk))
        .expression_attribute_values(":sk_prefix", AttributeValue::S("FEEDBACK#".to_string()))
        .send()
        .await?;

    let mut entries = Vec::new();

    for item in result.items() {
        if let Some(feedback) = feedback_from_item(prediction_id, item) {
            entries.push(feedback);
        }
    }

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(serde_json::to_string(&entries)?.into())
        .map_err(Box::new)?)
}

fn feedback_from_item(
    prediction_id: &str,
    item: &HashMap<String, AttributeValue>,
) -> Option<Feedback> {
    let sk = item.get("SK").and_then(|v| v.as_s().ok())?;
    let feedback_id = sk.strip_prefix("FEEDBACK#")?;

    Some(Feedback {
        feedback_id: feedback_id.to_string(),
        prediction_id: prediction_id.to_string(),
        user_id: item.get("user_id").and_then(|v| v.as_s().ok()).map(|s| s.to_string()).unwrap_or_default(),
        accuracy_rating: item.get("accuracy_rating").and_then(|v| v.as_n().ok()).and_then(|n| n.parse().ok()).unwrap_or_default(),
        comment: item.get("comment").and_then(|v| v.as_s().ok()).map(|s| s.to_string()),
        actual_yield: item.get("actual_yield").and_then(|v| v.as_s().ok()).map(|s| s.to_string()),
        created_at: item.get("created_at").and_then(|v| v.as_s().ok()).map(|s| s.to_string()).unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feedback_item_maps_back_to_record() {
        let mut item = HashMap::new();
        item.insert(
            "SK".to_string(),
            AttributeValue::S("FEEDBACK#f_1".to_string()),
        );
        item.insert("user_id".to_string(), AttributeValue::S("u_1".to_string()));
        item.insert(
            "accuracy_rating".to_string(),
            AttributeValue::N("4.5".to_string()),
        );
        item.insert(
            "comment".to_string(),
            AttributeValue::S("Close to the real harvest".to_string()),
        );
        item.insert(
            "actual_yield".to_string(),
            AttributeValue::S("38 bags/acre".to_string()),
        );

        let feedback = feedback_from_item("p_1", &item).unwrap();
        assert_eq!(feedback.feedback_id, "f_1");
        assert_eq!(feedback.prediction_id, "p_1");
        assert_eq!(feedback.user_id, "u_1");
        assert_eq!(feedback.accuracy_rating, 4.5);
        assert_eq!(feedback.comment.as_deref(), Some("Close to the real harvest"));
        assert_eq!(feedback.actual_yield.as_deref(), Some("38 bags/acre"));
    }

    #[test]
    fn out_of_scale_rating_is_stored_as_sent() {
        let mut item = HashMap::new();
        item.insert(
            "SK".to_string(),
            AttributeValue::S("FEEDBACK#f_2".to_string()),
        );
        item.insert(
            "accuracy_rating".to_string(),
            AttributeValue::N("-12".to_string()),
        );

        let feedback = feedback_from_item("p_1", &item).unwrap();
        assert_eq!(feedback.accuracy_rating, -12.0);
        assert!(feedback.comment.is_none());
    }

    #[test]
    fn non_feedback_items_are_skipped() {
        let mut item = HashMap::new();
        item.insert(
            "SK".to_string(),
            AttributeValue::S("PREDICTION#p_9".to_string()),
        );
        assert!(feedback_from_item("p_1", &item).is_none());
    }
}
