use serde::{Deserialize, Serialize};

// ========== USER ==========
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    #[default]
    User,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::User => "user",
            UserRole::Admin => "admin",
        }
    }

    /// Stored attribute value -> role. Unknown values fall back to `user`.
    pub fn from_attr(value: &str) -> Self {
        match value {
            "admin" => UserRole::Admin,
            _ => UserRole::User,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct User {
    pub clerk_id: String,
    pub name: String,
    pub username: String,
    pub email: String,
    pub phone: String,
    pub location: String,
    pub role: UserRole,
    pub image: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
pub struct SyncUserRequest {
    pub clerk_id: String,
    pub name: String,
    #[serde(default)]
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub location: String,
    pub image: Option<String>,
    pub role: Option<UserRole>,
}

// ========== PREDICTION ==========
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Prediction {
    pub prediction_id: String,
    pub user_id: String,
    pub crop_type: String,
    pub planting_date: i64,
    pub harvest_date: i64,
    pub yield_prediction: String,
    pub prediction_data: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
pub struct AddPredictionRequest {
    pub user_id: String,
    pub crop_type: String,
    pub planting_date: i64,
    pub harvest_date: i64,
    pub yield_prediction: String,
    pub prediction_data: Option<String>,
}

// ========== FEEDBACK ==========
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Feedback {
    pub feedback_id: String,
    pub prediction_id: String,
    pub user_id: String,
    pub accuracy_rating: f64,
    pub comment: Option<String>,
    pub actual_yield: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
pub struct SubmitFeedbackRequest {
    pub user_id: String,
    pub accuracy_rating: f64,
    pub comment: Option<String>,
    pub actual_yield: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_through_json() {
        let admin: UserRole = serde_json::from_str("\"admin\"").unwrap();
        assert_eq!(admin, UserRole::Admin);
        assert_eq!(serde_json::to_string(&UserRole::User).unwrap(), "\"user\"");
    }

    #[test]
    fn unknown_role_attr_defaults_to_user() {
        assert_eq!(UserRole::from_attr("superuser"), UserRole::User);
        assert_eq!(UserRole::from_attr("admin"), UserRole::Admin);
    }

    #[test]
    fn sync_request_defaults_optional_profile_fields() {
        let req: SyncUserRequest = serde_json::from_str(
            r#"{"clerk_id":"u_1","name":"A B","email":"a@b.com"}"#,
        )
        .unwrap();
        assert_eq!(req.username, "");
        assert_eq!(req.phone, "");
        assert_eq!(req.location, "");
        assert!(req.image.is_none());
        assert!(req.role.is_none());
    }
}
