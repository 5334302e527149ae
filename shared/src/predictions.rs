use aws_sdk_dynamodb::{types::AttributeValue, Client as DynamoClient};
use lambda_http::{http::StatusCode, Body, Error, Response};
use std::collections::HashMap;

use crate::types::{AddPredictionRequest, Prediction};

/// POST /predictions - record a new yield prediction for a user
///
/// No field validation beyond types: planting/harvest ordering is not
/// checked, matching the behavior the UI already depends on.
pub async fn add_prediction(
    client: &DynamoClient,
    table_name: &str,
    body: &[u8],
) -> Result<Response<Body>, Error> {
    let req: AddPredictionRequest = match serde_json::from_slice(body) {
        Ok(req) => req,
        Err(e) => {
            tracing::error!("Failed to parse prediction body: {}", e);
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

    let prediction_id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();
    let pk = format!("USER#{}", req.user_id);
    let sk = format!("PREDICTION#{}", prediction_id);

    let mut put_request = client
        .put_item()
        .table_name(table_name)
        .item("PK", AttributeValue::S(pk))
        .item("SK", AttributeValue::S(sk))
        .item("crop_type", AttributeValue::S(req.crop_type.clone()))
        .item("planting_date", AttributeValue::N(req.planting_date.to_string()))
        .item("harvest_date", AttributeValue::N(req.harvest_date.to_string()))
        .item("yield_prediction", AttributeValue::S(req.yield_prediction.clone()))
        .item("created_at", AttributeValue::S(now.clone()));

    if let Some(data) = &req.prediction_data {
        put_request = put_request.item("prediction_data", AttributeValue::S(data.clone()));
    }

    put_request.send().await?;

    let prediction = Prediction {
        prediction_id,
        user_id: req.user_id,
        crop_type: req.crop_type,
        planting_date: req.planting_date,
        harvest_date: req.harvest_date,
        yield_prediction: req.yield_prediction,
        prediction_data: req.prediction_data,
        created_at: now,
    };

    Ok(Response::builder()
        .status(StatusCode::CREATED)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(serde_json::to_string(&prediction)?.into())
        .map_err(Box::new)?)
}

/// GET /users/{user_id}/predictions - list all predictions made by a user
pub async fn list_user_predictions(
    client: &DynamoClient,
    table_name: &str,
    user_id: &str,
) -> Result<Response<Body>, Error> {
    let pk = format!("USER#{}", user_id);

    let result = client
        .query()
        .table_name(table_name)
        .key_condition_expression("PK = :pk AND begins_with(SK, :sk_prefix)")
        .expression_attribute_values(":pk", AttributeValue::S(pk))
        .expression_attribute_values(
            ":sk_prefix",
            AttributeValue::S("PREDICTION#".to_string()),
        )
        .send()
        .await?;

    let mut predictions = Vec::new();

    for item in result.items() {
        if let Some(prediction) = prediction_from_item(user_id, item) {
            predictions.push(prediction);
        }
    }

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(serde_json::to_string(&predictions)?.into())
        .map_err(Box::new)?)
}

fn prediction_from_item(
    user_id: &str,
    item: &HashMap<String, AttributeValue>,
) -> Option<Prediction> {
    let sk = item.get("SK").and_then(|v| v.as_s().ok())?;
    let prediction_id = sk.strip_prefix("PREDICTION#")?;

    Some(Prediction {
        prediction_id: prediction_id.to_string(),
        user_id: user_id.to_string(),
        crop_type: item.get("crop_type").and_then(|v| v.as_s().ok()).map(|s| s.to_string()).unwrap_or_default(),
        planting_date: item.get("planting_date").and_then(|v| v.as_n().ok()).and_then(|n| n.parse().ok()).unwrap_or_default(),
        harvest_date: item.get("harvest_date").and_then(|v| v.as_n().ok()).and_then(|n| n.parse().ok()).unwrap_or_default(),
        yield_prediction: item.get("yield_prediction").and_then(|v| v.as_s().ok()).map(|s| s.to_string()).unwrap_or_default(),
        prediction_data: item.get("prediction_data").and_then(|v| v.as_s().ok()).map(|s| s.to_string()),
        created_at: item.get("created_at").and_then(|v| v.as_s().ok()).map(|s| s.to_string()).unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prediction_item_maps_back_with_full_field_set() {
        let mut item = HashMap::new();
        item.insert("PK".to_string(), AttributeValue::S("USER#u_1".to_string()));
        item.insert(
            "SK".to_string(),
            AttributeValue::S("PREDICTION#p_1".to_string()),
        );
        item.insert("crop_type".to_string(), AttributeValue::S("maize".to_string()));
        item.insert(
            "planting_date".to_string(),
            AttributeValue::N("1714521600".to_string()),
        );
        item.insert(
            "harvest_date".to_string(),
            AttributeValue::N("1725148800".to_string()),
        );
        item.insert(
            "yield_prediction".to_string(),
            AttributeValue::S("40 bags/acre".to_string()),
        );
        item.insert(
            "prediction_data".to_string(),
            AttributeValue::S(r#"{"model":"v2"}"#.to_string()),
        );
        item.insert(
            "created_at".to_string(),
            AttributeValue::S("2026-01-01T00:00:00+00:00".to_string()),
        );

        let prediction = prediction_from_item("u_1", &item).unwrap();
        assert_eq!(prediction.prediction_id, "p_1");
        assert_eq!(prediction.user_id, "u_1");
        assert_eq!(prediction.crop_type, "maize");
        assert_eq!(prediction.planting_date, 1714521600);
        assert_eq!(prediction.harvest_date, 1725148800);
        assert_eq!(prediction.yield_prediction, "40 bags/acre");
        assert_eq!(prediction.prediction_data.as_deref(), Some(r#"{"model":"v2"}"#));
    }

    #[test]
    fn optional_payload_stays_absent() {
        let mut item = HashMap::new();
        item.insert(
            "SK".to_string(),
            AttributeValue::S("PREDICTION#p_2".to_string()),
        );
        item.insert("crop_type".to_string(), AttributeValue::S("beans".to_string()));

        let prediction = prediction_from_item("u_1", &item).unwrap();
        assert!(prediction.prediction_data.is_none());
    }

    #[test]
    fn profile_items_are_not_predictions() {
        let mut item = HashMap::new();
        item.insert("SK".to_string(), AttributeValue::S("PROFILE".to_string()));
        assert!(prediction_from_item("u_1", &item).is_none());
    }
}
