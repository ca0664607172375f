use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params, types::Value};

use crate::error::Result;
use crate::id::EntityType;
use crate::models::*;

use super::from_row::{
    BANK_DETAILS_COLS, BUSINESS_COLS, COUPON_COLS, EARNING_COLS, QR_CODE_COLS, REFERRAL_COLS,
    REVIEW_COLS, SUBSCRIPTION_COLS, FromRow, query_all, query_one,
};

pub fn now() -> i64 {
    Utc::now().timestamp()
}

/// Builder for dynamic UPDATE statements with optional fields.
struct UpdateBuilder {
    table: &'static str,
    id: String,
    fields: Vec<(&'static str, Value)>,
    track_updated_at: bool,
}

impl UpdateBuilder {
    fn new(table: &'static str, id: &str) -> Self {
        Self {
            table,
            id: id.to_string(),
            fields: Vec::new(),
            track_updated_at: false,
        }
    }

    fn with_updated_at(mut self) -> Self {
        self.track_updated_at = true;
        self
    }

    fn set(mut self, column: &'static str, value: impl Into<Value>) -> Self {
        self.fields.push((column, value.into()));
        self
    }

    fn set_opt<V: Into<Value>>(self, column: &'static str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.set(column, v),
            None => self,
        }
    }

    /// Execute the update and return the updated row.
    /// Returns None if no row matched or there was nothing to update.
    fn execute_returning<T: FromRow>(
        mut self,
        conn: &Connection,
        returning_cols: &str,
    ) -> Result<Option<T>> {
        if self.fields.is_empty() {
            return Ok(None);
        }
        if self.track_updated_at {
            self.fields.push(("updated_at", now().into()));
        }
        let sets: Vec<String> = self
            .fields
            .iter()
            .map(|(col, _)| format!("{} = ?", col))
            .collect();
        let mut values: Vec<Value> = self.fields.into_iter().map(|(_, v)| v).collect();
        values.push(self.id.into());
        let sql = format!(
            "UPDATE {} SET {} WHERE id = ? RETURNING {}",
            self.table,
            sets.join(", "),
            returning_cols
        );
        conn.query_row(&sql, rusqlite::params_from_iter(values), T::from_row)
            .optional()
            .map_err(Into::into)
    }
}

/// Emails are compared case-insensitively; store them normalized.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

// ============ Businesses ============

pub fn create_business(conn: &Connection, input: &CreateBusiness) -> Result<Business> {
    let id = EntityType::Business.gen_id();
    let now = now();
    let email = normalize_email(&input.email);

    conn.execute(
        "INSERT INTO businesses (id, email, password_hash, business_name, owner_name, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
        params![id, email, input.password_hash, input.business_name, input.owner_name, now],
    )?;

    Ok(Business {
        id,
        email,
        password_hash: input.password_hash.clone(),
        business_name: input.business_name.clone(),
        owner_name: input.owner_name.clone(),
        phone: None,
        address: None,
        google_review_link: None,
        subscription_status: BusinessStatus::Pending,
        trial_reviews_remaining: 0,
        trial_started_at: None,
        referral_code: None,
        total_referral_earnings_cents: 0,
        onboarding_completed: false,
        email_verified: false,
        is_admin: false,
        is_salesperson: false,
        created_at: now,
        updated_at: now,
    })
}

pub fn get_business_by_id(conn: &Connection, id: &str) -> Result<Option<Business>> {
    query_one(
        conn,
        &format!("SELECT {} FROM businesses WHERE id = ?1", BUSINESS_COLS),
        &[&id],
    )
}

pub fn get_business_by_email(conn: &Connection, email: &str) -> Result<Option<Business>> {
    let email = normalize_email(email);
    query_one(
        conn,
        &format!("SELECT {} FROM businesses WHERE email = ?1", BUSINESS_COLS),
        &[&email],
    )
}

/// Exact match only; codes are issued uppercase.
pub fn get_business_by_referral_code(conn: &Connection, code: &str) -> Result<Option<Business>> {
    query_one(
        conn,
        &format!("SELECT {} FROM businesses WHERE referral_code = ?1", BUSINESS_COLS),
        &[&code],
    )
}

pub fn email_exists(conn: &Connection, email: &str) -> Result<bool> {
    let email = normalize_email(email);
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM businesses WHERE email = ?1)",
        params![email],
        |row| row.get(0),
    )?;
    Ok(exists)
}

pub fn update_business_profile(
    conn: &Connection,
    id: &str,
    input: &UpdateBusinessProfile,
) -> Result<Option<Business>> {
    UpdateBuilder::new("businesses", id)
        .with_updated_at()
        .set_opt("business_name", input.business_name.clone())
        .set_opt("owner_name", input.owner_name.clone())
        .set_opt("phone", input.phone.clone())
        .set_opt("address", input.address.clone())
        .set_opt("google_review_link", input.google_review_link.clone())
        .execute_returning(conn, BUSINESS_COLS)
}

pub fn set_onboarding_completed(conn: &Connection, id: &str) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE businesses SET onboarding_completed = 1, updated_at = ?2 WHERE id = ?1",
        params![id, now()],
    )?;
    Ok(affected > 0)
}

pub fn set_email_verified(conn: &Connection, id: &str) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE businesses SET email_verified = 1, updated_at = ?2 WHERE id = ?1",
        params![id, now()],
    )?;
    Ok(affected > 0)
}

pub fn set_password_hash(conn: &Connection, id: &str, password_hash: &str) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE businesses SET password_hash = ?2, updated_at = ?3 WHERE id = ?1",
        params![id, password_hash, now()],
    )?;
    Ok(affected > 0)
}

/// Grant admin rights to an existing account. Returns false for an unknown email.
pub fn set_admin_by_email(conn: &Connection, email: &str) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE businesses SET is_admin = 1, updated_at = ?2 WHERE email = ?1",
        params![normalize_email(email), now()],
    )?;
    Ok(affected > 0)
}

/// Grant or revoke the salesperson flag. None for an unknown business.
pub fn set_salesperson(conn: &Connection, id: &str, is_salesperson: bool) -> Result<Option<Business>> {
    query_one(
        conn,
        &format!(
            "UPDATE businesses SET is_salesperson = ?2, updated_at = ?3 WHERE id = ?1 RETURNING {}",
            BUSINESS_COLS
        ),
        &[&id, &is_salesperson, &now()],
    )
}

/// Stores a referral code only if the business has none yet.
/// Returns false when another request already set one.
pub fn try_set_referral_code(conn: &Connection, id: &str, code: &str) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE businesses SET referral_code = ?2, updated_at = ?3
         WHERE id = ?1 AND referral_code IS NULL",
        params![id, code, now()],
    )?;
    Ok(affected > 0)
}

pub fn get_referral_code(conn: &Connection, id: &str) -> Result<Option<String>> {
    let code: Option<Option<String>> = conn
        .query_row(
            "SELECT referral_code FROM businesses WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(code.flatten())
}

pub fn list_businesses(conn: &Connection, limit: i64, offset: i64) -> Result<(Vec<Business>, i64)> {
    let total: i64 = conn.query_row("SELECT COUNT(*) FROM businesses", [], |row| row.get(0))?;
    let items = query_all(
        conn,
        &format!(
            "SELECT {} FROM businesses ORDER BY created_at DESC, id LIMIT ?1 OFFSET ?2",
            BUSINESS_COLS
        ),
        &[&limit, &offset],
    )?;
    Ok((items, total))
}

// ============ Subscriptions ============

pub fn get_subscription_by_business(
    conn: &Connection,
    business_id: &str,
) -> Result<Option<Subscription>> {
    query_one(
        conn,
        &format!("SELECT {} FROM subscriptions WHERE business_id = ?1", SUBSCRIPTION_COLS),
        &[&business_id],
    )
}

pub fn get_subscription_by_stripe_subscription(
    conn: &Connection,
    stripe_subscription_id: &str,
) -> Result<Option<Subscription>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM subscriptions WHERE stripe_subscription_id = ?1",
            SUBSCRIPTION_COLS
        ),
        &[&stripe_subscription_id],
    )
}

pub fn get_subscription_by_stripe_customer(
    conn: &Connection,
    stripe_customer_id: &str,
) -> Result<Option<Subscription>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM subscriptions WHERE stripe_customer_id = ?1",
            SUBSCRIPTION_COLS
        ),
        &[&stripe_customer_id],
    )
}

/// Fill in billing details fetched from the provider after checkout.
/// Leaves existing values in place when the provider returned nothing.
pub fn update_subscription_billing_details(
    conn: &Connection,
    stripe_subscription_id: &str,
    current_period_end: Option<i64>,
    card_brand: Option<&str>,
    card_last4: Option<&str>,
) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE subscriptions SET
            current_period_end = COALESCE(?2, current_period_end),
            card_brand = COALESCE(?3, card_brand),
            card_last4 = COALESCE(?4, card_last4),
            updated_at = ?5
         WHERE stripe_subscription_id = ?1",
        params![stripe_subscription_id, current_period_end, card_brand, card_last4, now()],
    )?;
    Ok(affected > 0)
}

// ============ Referrals ============

/// Insert a referral edge. Returns false if the business was already referred.
pub fn try_create_referral(
    conn: &Connection,
    referrer_id: &str,
    referred_business_id: &str,
) -> Result<bool> {
    let now = now();
    let affected = conn.execute(
        "INSERT OR IGNORE INTO referrals (id, referrer_id, referred_business_id, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, 'pending', ?4, ?4)",
        params![EntityType::Referral.gen_id(), referrer_id, referred_business_id, now],
    )?;
    Ok(affected > 0)
}

pub fn get_referral_by_referred(
    conn: &Connection,
    referred_business_id: &str,
) -> Result<Option<Referral>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM referrals WHERE referred_business_id = ?1",
            REFERRAL_COLS
        ),
        &[&referred_business_id],
    )
}

pub fn list_referrals_by_referrer(conn: &Connection, referrer_id: &str) -> Result<Vec<Referral>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM referrals WHERE referrer_id = ?1 ORDER BY created_at DESC, id",
            REFERRAL_COLS
        ),
        &[&referrer_id],
    )
}

/// Referral edge joined with what the referrer's dashboard needs about the referred business.
#[derive(Debug, Clone)]
pub struct ReferralRow {
    pub referral: Referral,
    pub business_name: String,
    pub email: String,
    pub onboarding_completed: bool,
    pub subscription_status: BusinessStatus,
    pub earnings_cents: i64,
}

impl FromRow for ReferralRow {
    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(ReferralRow {
            referral: Referral::from_row(row)?,
            business_name: row.get(6)?,
            email: row.get(7)?,
            onboarding_completed: row.get::<_, i32>(8)? != 0,
            subscription_status: row.get::<_, String>(9)?.parse().map_err(|_| {
                rusqlite::Error::InvalidColumnType(
                    9,
                    "subscription_status".into(),
                    rusqlite::types::Type::Text,
                )
            })?,
            earnings_cents: row.get(10)?,
        })
    }
}

pub fn list_referral_rows(conn: &Connection, referrer_id: &str) -> Result<Vec<ReferralRow>> {
    query_all(
        conn,
        "SELECT r.id, r.referrer_id, r.referred_business_id, r.status, r.created_at, r.updated_at,
                b.business_name, b.email, b.onboarding_completed, b.subscription_status,
                COALESCE(e.amount_cents, 0)
         FROM referrals r
         JOIN businesses b ON b.id = r.referred_business_id
         LEFT JOIN referral_earnings e
             ON e.business_id = r.referred_business_id AND e.seller_id = r.referrer_id
         WHERE r.referrer_id = ?1
         ORDER BY r.created_at DESC, r.id",
        &[&referrer_id],
    )
}

// ============ Referral Earnings ============

pub fn get_earning(
    conn: &Connection,
    seller_id: &str,
    business_id: &str,
) -> Result<Option<ReferralEarning>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM referral_earnings WHERE seller_id = ?1 AND business_id = ?2",
            EARNING_COLS
        ),
        &[&seller_id, &business_id],
    )
}

pub fn list_earnings_for_seller(
    conn: &Connection,
    seller_id: &str,
    limit: i64,
    offset: i64,
) -> Result<(Vec<ReferralEarning>, i64)> {
    let total: i64 = conn.query_row(
        "SELECT COUNT(*) FROM referral_earnings WHERE seller_id = ?1",
        params![seller_id],
        |row| row.get(0),
    )?;
    let items = query_all(
        conn,
        &format!(
            "SELECT {} FROM referral_earnings WHERE seller_id = ?1
             ORDER BY created_at DESC, id LIMIT ?2 OFFSET ?3",
            EARNING_COLS
        ),
        &[&seller_id, &limit, &offset],
    )?;
    Ok((items, total))
}

/// (all-time earnings, earnings not yet paid out) in cents.
pub fn get_seller_earning_totals(conn: &Connection, seller_id: &str) -> Result<(i64, i64)> {
    conn.query_row(
        "SELECT COALESCE(SUM(amount_cents), 0),
                COALESCE(SUM(CASE WHEN status = 'pending' THEN amount_cents ELSE 0 END), 0)
         FROM referral_earnings WHERE seller_id = ?1",
        params![seller_id],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )
    .map_err(Into::into)
}

// ============ Salespeople ============

/// Active counts match the dashboard's rule: referral converted or referred business paying.
const SALESPERSON_SUMMARY_SELECT: &str = "SELECT s.id, s.business_name, s.email, s.referral_code,
        (SELECT COUNT(*) FROM referrals r WHERE r.referrer_id = s.id),
        (SELECT COUNT(*) FROM referrals r
             JOIN businesses b ON b.id = r.referred_business_id
         WHERE r.referrer_id = s.id
           AND (r.status = 'active' OR b.subscription_status = 'active')),
        (SELECT COALESCE(SUM(e.amount_cents), 0) FROM referral_earnings e WHERE e.seller_id = s.id),
        s.created_at
     FROM businesses s
     WHERE s.is_salesperson = 1";

/// Salespeople by total commission, highest first.
pub fn list_salespeople(conn: &Connection) -> Result<Vec<SalespersonSummary>> {
    query_all(
        conn,
        &format!("{} ORDER BY 7 DESC, s.created_at, s.id", SALESPERSON_SUMMARY_SELECT),
        &[],
    )
}

/// None when the business does not exist or is not a salesperson.
pub fn get_salesperson(conn: &Connection, id: &str) -> Result<Option<SalespersonSummary>> {
    query_one(
        conn,
        &format!("{} AND s.id = ?1", SALESPERSON_SUMMARY_SELECT),
        &[&id],
    )
}

pub fn list_seller_payments(
    conn: &Connection,
    seller_id: &str,
    limit: i64,
    offset: i64,
) -> Result<(Vec<SellerPayment>, i64)> {
    let total: i64 = conn.query_row(
        "SELECT COUNT(*) FROM referral_earnings WHERE seller_id = ?1",
        params![seller_id],
        |row| row.get(0),
    )?;
    let items = query_all(
        conn,
        "SELECT e.id, e.business_id, b.business_name, e.amount_cents, e.status, e.created_at
         FROM referral_earnings e
         JOIN businesses b ON b.id = e.business_id
         WHERE e.seller_id = ?1
         ORDER BY e.created_at DESC, e.id LIMIT ?2 OFFSET ?3",
        &[&seller_id, &limit, &offset],
    )?;
    Ok((items, total))
}

// ============ Coupons ============

pub fn create_coupon(conn: &Connection, input: &CreateCoupon) -> Result<Coupon> {
    let id = EntityType::Coupon.gen_id();
    let now = now();

    conn.execute(
        "INSERT INTO coupons (id, code, coupon_type, value, max_uses, times_used, is_active, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, 0, 1, ?6)",
        params![id, input.code, input.coupon_type.as_ref(), input.value, input.max_uses, now],
    )?;

    Ok(Coupon {
        id,
        code: input.code.clone(),
        coupon_type: input.coupon_type,
        value: input.value,
        max_uses: input.max_uses,
        times_used: 0,
        is_active: true,
        created_at: now,
    })
}

pub fn get_coupon_by_code(conn: &Connection, code: &str) -> Result<Option<Coupon>> {
    query_one(
        conn,
        &format!("SELECT {} FROM coupons WHERE code = ?1", COUPON_COLS),
        &[&code],
    )
}

pub fn list_coupons(conn: &Connection) -> Result<Vec<Coupon>> {
    query_all(
        conn,
        &format!("SELECT {} FROM coupons ORDER BY created_at DESC, id", COUPON_COLS),
        &[],
    )
}

pub fn deactivate_coupon(conn: &Connection, id: &str) -> Result<Option<Coupon>> {
    UpdateBuilder::new("coupons", id)
        .set("is_active", 0)
        .execute_returning(conn, COUPON_COLS)
}

pub fn has_redeemed_coupon(conn: &Connection, coupon_id: &str, business_id: &str) -> Result<bool> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM coupon_redemptions WHERE coupon_id = ?1 AND business_id = ?2)",
        params![coupon_id, business_id],
        |row| row.get(0),
    )?;
    Ok(exists)
}

/// Record a redemption. Returns false if this business already redeemed the coupon.
pub fn try_record_coupon_redemption(
    conn: &Connection,
    coupon_id: &str,
    business_id: &str,
) -> Result<bool> {
    let affected = conn.execute(
        "INSERT OR IGNORE INTO coupon_redemptions (id, coupon_id, business_id, redeemed_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![EntityType::CouponRedemption.gen_id(), coupon_id, business_id, now()],
    )?;
    Ok(affected > 0)
}

/// Count one use, only while the coupon is active and under its limit.
pub fn try_increment_coupon_use(conn: &Connection, coupon_id: &str) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE coupons SET times_used = times_used + 1
         WHERE id = ?1 AND is_active = 1 AND (max_uses IS NULL OR times_used < max_uses)",
        params![coupon_id],
    )?;
    Ok(affected > 0)
}

// ============ Reviews ============

pub fn create_review(conn: &Connection, business_id: &str, input: &CreateReview) -> Result<Review> {
    let id = EntityType::Review.gen_id();
    let now = now();

    conn.execute(
        "INSERT INTO reviews (id, business_id, rating, comment, customer_name, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![id, business_id, input.rating, input.comment, input.customer_name, now],
    )?;

    Ok(Review {
        id,
        business_id: business_id.to_string(),
        rating: input.rating,
        comment: input.comment.clone(),
        customer_name: input.customer_name.clone(),
        reply: None,
        replied_at: None,
        improvement_areas: None,
        feedback: None,
        created_at: now,
    })
}

fn review_filter_clause(filter: Option<ReviewFilter>) -> &'static str {
    match filter {
        Some(ReviewFilter::Positive) => " AND rating >= 4",
        Some(ReviewFilter::Negative) => " AND rating < 4",
        None => "",
    }
}

pub fn list_reviews(
    conn: &Connection,
    business_id: &str,
    filter: Option<ReviewFilter>,
    limit: i64,
    offset: i64,
) -> Result<(Vec<Review>, i64)> {
    let clause = review_filter_clause(filter);
    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM reviews WHERE business_id = ?1{}", clause),
        params![business_id],
        |row| row.get(0),
    )?;
    let items = query_all(
        conn,
        &format!(
            "SELECT {} FROM reviews WHERE business_id = ?1{}
             ORDER BY created_at DESC, id LIMIT ?2 OFFSET ?3",
            REVIEW_COLS, clause
        ),
        &[&business_id, &limit, &offset],
    )?;
    Ok((items, total))
}

pub fn get_review_stats(conn: &Connection, business_id: &str) -> Result<ReviewStats> {
    conn.query_row(
        "SELECT COUNT(*),
                COUNT(CASE WHEN rating >= 4 THEN 1 END),
                COUNT(CASE WHEN rating < 4 THEN 1 END),
                ROUND(AVG(rating), 1)
         FROM reviews WHERE business_id = ?1",
        params![business_id],
        |row| {
            Ok(ReviewStats {
                total: row.get(0)?,
                positive: row.get(1)?,
                negative: row.get(2)?,
                average_rating: row.get(3)?,
            })
        },
    )
    .map_err(Into::into)
}

pub fn reply_to_review(
    conn: &Connection,
    business_id: &str,
    review_id: &str,
    reply: &str,
) -> Result<Option<Review>> {
    query_one(
        conn,
        &format!(
            "UPDATE reviews SET reply = ?3, replied_at = ?4
             WHERE id = ?1 AND business_id = ?2 RETURNING {}",
            REVIEW_COLS
        ),
        &[&review_id, &business_id, &reply, &now()],
    )
}

pub fn submit_review_survey(
    conn: &Connection,
    business_id: &str,
    review_id: &str,
    improvement_areas: Option<&str>,
    feedback: Option<&str>,
) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE reviews SET improvement_areas = ?3, feedback = ?4
         WHERE id = ?1 AND business_id = ?2",
        params![review_id, business_id, improvement_areas, feedback],
    )?;
    Ok(affected > 0)
}

// ============ QR Codes ============

/// Returns false when the business already has a url id for `qr_type`.
/// A `url_id` collision is left to surface as a constraint error.
pub fn try_create_qr_code(conn: &Connection, url_id: &str, business_id: &str, qr_type: &str) -> Result<bool> {
    let inserted = conn.execute(
        "INSERT INTO qr_codes (url_id, business_id, qr_type, created_at)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(business_id, qr_type) DO NOTHING",
        params![url_id, business_id, qr_type, now()],
    )?;
    Ok(inserted > 0)
}

pub fn get_qr_code(conn: &Connection, business_id: &str, qr_type: &str) -> Result<Option<QrCode>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM qr_codes WHERE business_id = ?1 AND qr_type = ?2",
            QR_CODE_COLS
        ),
        &[&business_id, &qr_type],
    )
}

pub fn get_qr_code_by_url_id(conn: &Connection, url_id: &str) -> Result<Option<QrCode>> {
    query_one(
        conn,
        &format!("SELECT {} FROM qr_codes WHERE url_id = ?1", QR_CODE_COLS),
        &[&url_id],
    )
}

pub fn list_qr_codes(conn: &Connection, business_id: &str) -> Result<Vec<QrCode>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM qr_codes WHERE business_id = ?1 ORDER BY created_at, qr_type",
            QR_CODE_COLS
        ),
        &[&business_id],
    )
}

// ============ Bank Details ============

pub fn get_bank_details(conn: &Connection, business_id: &str) -> Result<Option<BankDetails>> {
    query_one(
        conn,
        &format!("SELECT {} FROM bank_details WHERE business_id = ?1", BANK_DETAILS_COLS),
        &[&business_id],
    )
}

pub fn upsert_bank_details(
    conn: &Connection,
    business_id: &str,
    account_holder: &str,
    transit_number: &str,
    institution_number: &str,
    account_number: &str,
) -> Result<BankDetails> {
    let row = query_one(
        conn,
        &format!(
            "INSERT INTO bank_details (business_id, account_holder, transit_number, institution_number, account_number, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(business_id) DO UPDATE SET
                account_holder = excluded.account_holder,
                transit_number = excluded.transit_number,
                institution_number = excluded.institution_number,
                account_number = excluded.account_number,
                updated_at = excluded.updated_at
             RETURNING {}",
            BANK_DETAILS_COLS
        ),
        &[
            &business_id,
            &account_holder,
            &transit_number,
            &institution_number,
            &account_number,
            &now(),
        ],
    )?;
    row.ok_or_else(|| crate::error::AppError::Internal("bank details upsert returned no row".into()))
}

// ============ Verification Tokens ============

pub fn create_verification_token(
    conn: &Connection,
    token_hash: &str,
    business_id: &str,
    purpose: TokenPurpose,
) -> Result<VerificationToken> {
    let now = now();
    let expires_at = now + purpose.ttl_secs();
    conn.execute(
        "INSERT INTO verification_tokens (token_hash, business_id, purpose, expires_at, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![token_hash, business_id, purpose.as_ref(), expires_at, now],
    )?;
    Ok(VerificationToken {
        token_hash: token_hash.to_string(),
        business_id: business_id.to_string(),
        purpose,
        expires_at,
        created_at: now,
    })
}

/// Consume an unexpired token. Returns the owning business id, or None if the
/// token is unknown, expired, already used, or issued for another purpose.
pub fn take_verification_token(
    conn: &Connection,
    token_hash: &str,
    purpose: TokenPurpose,
) -> Result<Option<String>> {
    conn.query_row(
        "DELETE FROM verification_tokens
         WHERE token_hash = ?1 AND purpose = ?2 AND expires_at > ?3
         RETURNING business_id",
        params![token_hash, purpose.as_ref(), now()],
        |row| row.get(0),
    )
    .optional()
    .map_err(Into::into)
}

pub fn delete_verification_tokens(
    conn: &Connection,
    business_id: &str,
    purpose: TokenPurpose,
) -> Result<usize> {
    let deleted = conn.execute(
        "DELETE FROM verification_tokens WHERE business_id = ?1 AND purpose = ?2",
        params![business_id, purpose.as_ref()],
    )?;
    Ok(deleted)
}

pub fn purge_expired_verification_tokens(conn: &Connection) -> Result<usize> {
    let deleted = conn.execute(
        "DELETE FROM verification_tokens WHERE expires_at <= ?1",
        params![now()],
    )?;
    Ok(deleted)
}

// ============ Webhook Replay Prevention ============

/// Record a processed webhook event id. Returns false if it was already recorded.
pub fn try_record_webhook_event(conn: &Connection, provider: &str, event_id: &str) -> Result<bool> {
    let affected = conn.execute(
        "INSERT OR IGNORE INTO webhook_events (provider, event_id, created_at) VALUES (?1, ?2, ?3)",
        params![provider, event_id, now()],
    )?;
    Ok(affected > 0)
}

/// Purge webhook event ids older than the retention period.
/// Stripe retries for about 3 days, so anything older cannot be replayed.
pub fn purge_old_webhook_events(conn: &Connection, retention_days: i64) -> Result<usize> {
    let cutoff = now() - (retention_days * 86400);
    let deleted = conn.execute(
        "DELETE FROM webhook_events WHERE created_at < ?1",
        params![cutoff],
    )?;
    Ok(deleted)
}
