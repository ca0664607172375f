use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct Review {
    pub id: String,
    pub business_id: String,
    pub rating: i64,
    pub comment: Option<String>,
    pub customer_name: Option<String>,
    pub reply: Option<String>,
    pub replied_at: Option<i64>,
    pub improvement_areas: Option<String>,
    pub feedback: Option<String>,
    pub created_at: i64,
}

/// Positive means 4 stars or more.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewFilter {
    Positive,
    Negative,
}

#[derive(Debug, Clone)]
pub struct CreateReview {
    pub rating: i64,
    pub comment: Option<String>,
    pub customer_name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReviewStats {
    pub total: i64,
    pub positive: i64,
    pub negative: i64,
    pub average_rating: Option<f64>,
}
