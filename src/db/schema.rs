use rusqlite::Connection;

/// Initialize the database schema. Safe to run on every startup.
pub fn init_db(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA foreign_keys = ON;
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;

        -- Businesses (tenants). Never hard-deleted.
        -- subscription_status mirrors subscriptions.status for the access gate's hot path.
        CREATE TABLE IF NOT EXISTS businesses (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            business_name TEXT NOT NULL,
            owner_name TEXT,
            phone TEXT,
            address TEXT,
            google_review_link TEXT,
            subscription_status TEXT NOT NULL DEFAULT 'pending'
                CHECK (subscription_status IN ('pending', 'trial', 'active', 'cancelling', 'cancelled')),
            trial_reviews_remaining INTEGER NOT NULL DEFAULT 0 CHECK (trial_reviews_remaining >= 0),
            trial_started_at INTEGER,
            referral_code TEXT UNIQUE,
            total_referral_earnings_cents INTEGER NOT NULL DEFAULT 0
                CHECK (total_referral_earnings_cents >= 0),
            onboarding_completed INTEGER NOT NULL DEFAULT 0,
            email_verified INTEGER NOT NULL DEFAULT 0,
            is_admin INTEGER NOT NULL DEFAULT 0,
            is_salesperson INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );

        -- Payment provider mirror, one row per business (upserted)
        CREATE TABLE IF NOT EXISTS subscriptions (
            id TEXT PRIMARY KEY,
            business_id TEXT NOT NULL UNIQUE REFERENCES businesses(id),
            stripe_customer_id TEXT,
            stripe_subscription_id TEXT,
            status TEXT NOT NULL,
            amount_cents INTEGER,
            current_period_end INTEGER,
            cancel_at_period_end INTEGER NOT NULL DEFAULT 0,
            cancelled_at INTEGER,
            ended_at INTEGER,
            card_brand TEXT,
            card_last4 TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_subscriptions_stripe_sub ON subscriptions(stripe_subscription_id);
        CREATE INDEX IF NOT EXISTS idx_subscriptions_stripe_customer ON subscriptions(stripe_customer_id);

        -- Referral edges. A business is referred by at most one party.
        CREATE TABLE IF NOT EXISTS referrals (
            id TEXT PRIMARY KEY,
            referrer_id TEXT NOT NULL REFERENCES businesses(id),
            referred_business_id TEXT NOT NULL UNIQUE REFERENCES businesses(id),
            status TEXT NOT NULL DEFAULT 'pending' CHECK (status IN ('pending', 'active')),
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            CHECK (referrer_id != referred_business_id)
        );
        CREATE INDEX IF NOT EXISTS idx_referrals_referrer ON referrals(referrer_id);

        -- Commission ledger. The unique pair is the idempotency guard.
        CREATE TABLE IF NOT EXISTS referral_earnings (
            id TEXT PRIMARY KEY,
            seller_id TEXT NOT NULL REFERENCES businesses(id),
            business_id TEXT NOT NULL REFERENCES businesses(id),
            amount_cents INTEGER NOT NULL CHECK (amount_cents > 0),
            status TEXT NOT NULL DEFAULT 'pending' CHECK (status IN ('pending', 'paid')),
            created_at INTEGER NOT NULL,
            UNIQUE (seller_id, business_id)
        );
        CREATE INDEX IF NOT EXISTS idx_referral_earnings_seller ON referral_earnings(seller_id);

        CREATE TABLE IF NOT EXISTS coupons (
            id TEXT PRIMARY KEY,
            code TEXT NOT NULL UNIQUE,
            coupon_type TEXT NOT NULL CHECK (coupon_type IN ('trial', 'discount')),
            value INTEGER NOT NULL CHECK (value > 0),
            max_uses INTEGER,
            times_used INTEGER NOT NULL DEFAULT 0,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS coupon_redemptions (
            id TEXT PRIMARY KEY,
            coupon_id TEXT NOT NULL REFERENCES coupons(id),
            business_id TEXT NOT NULL REFERENCES businesses(id),
            redeemed_at INTEGER NOT NULL,
            UNIQUE (coupon_id, business_id)
        );

        CREATE TABLE IF NOT EXISTS reviews (
            id TEXT PRIMARY KEY,
            business_id TEXT NOT NULL REFERENCES businesses(id),
            rating INTEGER NOT NULL CHECK (rating BETWEEN 1 AND 5),
            comment TEXT,
            customer_name TEXT,
            reply TEXT,
            replied_at INTEGER,
            improvement_areas TEXT,
            feedback TEXT,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_reviews_business ON reviews(business_id, created_at);

        CREATE TABLE IF NOT EXISTS bank_details (
            business_id TEXT PRIMARY KEY REFERENCES businesses(id),
            account_holder TEXT NOT NULL,
            transit_number TEXT NOT NULL,
            institution_number TEXT NOT NULL,
            account_number TEXT NOT NULL,
            updated_at INTEGER NOT NULL
        );

        -- Emailed single-use tokens (stored as SHA-256 hex)
        CREATE TABLE IF NOT EXISTS verification_tokens (
            token_hash TEXT PRIMARY KEY,
            business_id TEXT NOT NULL REFERENCES businesses(id),
            purpose TEXT NOT NULL CHECK (purpose IN ('email_verification', 'password_reset')),
            expires_at INTEGER NOT NULL,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_verification_tokens_business ON verification_tokens(business_id, purpose);

        -- Opaque public ids printed on QR codes, one per (business, qr_type)
        CREATE TABLE IF NOT EXISTS qr_codes (
            url_id TEXT PRIMARY KEY,
            business_id TEXT NOT NULL REFERENCES businesses(id),
            qr_type TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            UNIQUE (business_id, qr_type)
        );

        -- Processed webhook event ids, for replay rejection
        CREATE TABLE IF NOT EXISTS webhook_events (
            provider TEXT NOT NULL,
            event_id TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            PRIMARY KEY (provider, event_id)
        );
        "#,
    )
}
