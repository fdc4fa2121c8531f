//! SQL schema definitions.

/// Complete schema for the v1 database.
pub const SCHEMA_V1: &str = r#"
-- ============================================================
-- Accounts
-- ============================================================

CREATE TABLE IF NOT EXISTS profiles (
    id TEXT PRIMARY KEY,
    username TEXT NOT NULL UNIQUE,
    full_name TEXT,
    avatar_url TEXT,
    bio TEXT,
    youtube_channel TEXT,
    credits INTEGER NOT NULL DEFAULT 0 CHECK (credits >= 0),
    level INTEGER NOT NULL DEFAULT 1 CHECK (level >= 1),
    xp INTEGER NOT NULL DEFAULT 0 CHECK (xp >= 0),
    streak_count INTEGER NOT NULL DEFAULT 0,
    last_login_day INTEGER,
    last_reward_day INTEGER,
    referral_code TEXT UNIQUE,
    referred_by TEXT REFERENCES profiles(id),
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_profiles_rank ON profiles(level DESC, xp DESC, created_at ASC);
CREATE INDEX IF NOT EXISTS idx_profiles_referred_by ON profiles(referred_by);

-- Roles are granted from config before the account's first login,
-- so there is no foreign key to profiles.
CREATE TABLE IF NOT EXISTS user_roles (
    user_id TEXT PRIMARY KEY,
    role TEXT NOT NULL CHECK (role IN ('user', 'moderator', 'admin')),
    granted_at INTEGER NOT NULL
);

-- ============================================================
-- Catalog, campaigns & tasks
-- ============================================================

CREATE TABLE IF NOT EXISTS videos (
    id TEXT PRIMARY KEY,
    youtube_id TEXT NOT NULL UNIQUE,
    title TEXT NOT NULL,
    description TEXT,
    channel_name TEXT,
    channel_id TEXT,
    thumbnail_url TEXT,
    duration_secs INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS campaigns (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL REFERENCES profiles(id),
    video_id TEXT NOT NULL REFERENCES videos(id),
    title TEXT NOT NULL,
    description TEXT,
    target_actions INTEGER NOT NULL CHECK (target_actions > 0),
    completed_actions INTEGER NOT NULL DEFAULT 0 CHECK (completed_actions >= 0),
    credits_allocated INTEGER NOT NULL CHECK (credits_allocated > 0),
    credits_spent INTEGER NOT NULL DEFAULT 0 CHECK (credits_spent >= 0),
    status TEXT NOT NULL DEFAULT 'active'
        CHECK (status IN ('active', 'paused', 'completed', 'cancelled')),
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    CHECK (credits_spent <= credits_allocated),
    CHECK (completed_actions <= target_actions)
);

CREATE INDEX IF NOT EXISTS idx_campaigns_user ON campaigns(user_id);
CREATE INDEX IF NOT EXISTS idx_campaigns_status ON campaigns(status);

CREATE TABLE IF NOT EXISTS tasks (
    id TEXT PRIMARY KEY,
    campaign_id TEXT NOT NULL REFERENCES campaigns(id),
    video_id TEXT NOT NULL REFERENCES videos(id),
    task_type TEXT NOT NULL CHECK (task_type IN ('watch', 'like', 'subscribe')),
    credits_reward INTEGER NOT NULL CHECK (credits_reward > 0),
    created_by TEXT NOT NULL REFERENCES profiles(id),
    status TEXT NOT NULL DEFAULT 'pending'
        CHECK (status IN ('pending', 'in_progress', 'completed', 'failed')),
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_tasks_campaign ON tasks(campaign_id);
CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks(status, created_at DESC);
CREATE INDEX IF NOT EXISTS idx_tasks_video ON tasks(video_id, task_type);

CREATE TABLE IF NOT EXISTS user_tasks (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL REFERENCES profiles(id),
    task_id TEXT NOT NULL REFERENCES tasks(id),
    status TEXT NOT NULL DEFAULT 'in_progress'
        CHECK (status IN ('pending', 'in_progress', 'completed', 'failed')),
    credits_earned INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL,
    completed_at INTEGER,
    UNIQUE (user_id, task_id)
);

CREATE INDEX IF NOT EXISTS idx_user_tasks_completed ON user_tasks(user_id, completed_at);

-- ============================================================
-- Credit ledger
-- ============================================================

CREATE TABLE IF NOT EXISTS credit_transactions (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL REFERENCES profiles(id),
    amount INTEGER NOT NULL CHECK (amount != 0),
    transaction_type TEXT NOT NULL,
    description TEXT,
    reference_id TEXT,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_credit_tx_user ON credit_transactions(user_id, created_at DESC);

-- ============================================================
-- Gamification
-- ============================================================

CREATE TABLE IF NOT EXISTS user_achievements (
    user_id TEXT NOT NULL REFERENCES profiles(id),
    achievement_id TEXT NOT NULL,
    unlocked_at INTEGER NOT NULL,
    PRIMARY KEY (user_id, achievement_id)
);

-- ============================================================
-- Fraud
-- ============================================================

CREATE TABLE IF NOT EXISTS fraud_logs (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    ip_address TEXT NOT NULL,
    device_fingerprint TEXT NOT NULL,
    event_type TEXT NOT NULL,
    event_details TEXT NOT NULL DEFAULT '{}',
    risk_score INTEGER NOT NULL DEFAULT 0 CHECK (risk_score BETWEEN 0 AND 100),
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_fraud_logs_user ON fraud_logs(user_id, created_at DESC);
CREATE INDEX IF NOT EXISTS idx_fraud_logs_ip ON fraud_logs(ip_address, created_at);
CREATE INDEX IF NOT EXISTS idx_fraud_logs_time ON fraud_logs(created_at);

-- ============================================================
-- Moderation
-- ============================================================

CREATE TABLE IF NOT EXISTS content_reports (
    id TEXT PRIMARY KEY,
    reporter_id TEXT NOT NULL REFERENCES profiles(id),
    content_type TEXT NOT NULL CHECK (content_type IN ('video', 'user', 'campaign', 'comment')),
    content_id TEXT NOT NULL,
    reason TEXT NOT NULL,
    description TEXT,
    status TEXT NOT NULL DEFAULT 'pending'
        CHECK (status IN ('pending', 'reviewing', 'resolved', 'dismissed')),
    reviewed_by TEXT,
    reviewed_at INTEGER,
    resolution_notes TEXT,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_reports_content ON content_reports(content_type, content_id, status);
CREATE INDEX IF NOT EXISTS idx_reports_reporter ON content_reports(reporter_id);

CREATE TABLE IF NOT EXISTS moderation_queue (
    id TEXT PRIMARY KEY,
    content_type TEXT NOT NULL CHECK (content_type IN ('video', 'user', 'campaign', 'comment')),
    content_id TEXT NOT NULL,
    flag_reasons TEXT NOT NULL DEFAULT '[]',
    auto_flagged INTEGER NOT NULL DEFAULT 0,
    priority TEXT NOT NULL DEFAULT 'medium'
        CHECK (priority IN ('low', 'medium', 'high', 'urgent')),
    status TEXT NOT NULL DEFAULT 'pending'
        CHECK (status IN ('pending', 'approved', 'rejected')),
    reviewed_by TEXT,
    reviewed_at INTEGER,
    review_notes TEXT,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    UNIQUE (content_type, content_id)
);

CREATE TABLE IF NOT EXISTS user_bans (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL REFERENCES profiles(id),
    banned_by TEXT NOT NULL,
    reason TEXT NOT NULL,
    ban_type TEXT NOT NULL CHECK (ban_type IN ('temporary', 'permanent')),
    expires_at INTEGER,
    appeal_text TEXT,
    appeal_status TEXT CHECK (appeal_status IN ('pending', 'approved', 'denied')),
    appeal_submitted_at INTEGER,
    appeal_reviewed_by TEXT,
    appeal_reviewed_at INTEGER,
    created_at INTEGER NOT NULL,
    CHECK (ban_type = 'permanent' OR expires_at IS NOT NULL)
);

CREATE INDEX IF NOT EXISTS idx_bans_user ON user_bans(user_id);

-- ============================================================
-- Referrals
-- ============================================================

CREATE TABLE IF NOT EXISTS referral_events (
    id TEXT PRIMARY KEY,
    referrer_id TEXT NOT NULL REFERENCES profiles(id),
    referee_id TEXT NOT NULL UNIQUE REFERENCES profiles(id),
    referral_code TEXT NOT NULL,
    bonus_awarded INTEGER NOT NULL,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_referral_events_referrer ON referral_events(referrer_id, created_at);
"#;
