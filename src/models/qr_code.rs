use serde::Serialize;

/// Public review-page id behind a printed QR code.
#[derive(Debug, Clone, Serialize)]
pub struct QrCode {
    pub url_id: String,
    #[serde(skip_serializing)]
    pub business_id: String,
    pub qr_type: String,
    pub created_at: i64,
}
