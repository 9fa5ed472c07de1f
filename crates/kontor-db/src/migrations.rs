use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id                  TEXT PRIMARY KEY,
            email               TEXT NOT NULL UNIQUE,
            password_hash       TEXT NOT NULL,
            role                TEXT NOT NULL DEFAULT 'user',
            subscription_status TEXT NOT NULL DEFAULT 'trial',
            last_login_at       TEXT,
            created_at          TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS user_profiles (
            id           TEXT PRIMARY KEY,
            user_id      TEXT NOT NULL UNIQUE REFERENCES users(id) ON DELETE CASCADE,
            company_name TEXT NOT NULL,
            vat_id       TEXT NOT NULL,
            address      TEXT NOT NULL,
            country      TEXT NOT NULL,
            created_at   TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at   TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS conversation_threads (
            id          TEXT PRIMARY KEY,
            user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            module      TEXT NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_threads_user_module
            ON conversation_threads(user_id, module, updated_at);

        CREATE TABLE IF NOT EXISTS messages (
            id          TEXT PRIMARY KEY,
            thread_id   TEXT NOT NULL REFERENCES conversation_threads(id) ON DELETE CASCADE,
            role        TEXT NOT NULL,
            content     TEXT NOT NULL,
            metadata    TEXT,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_messages_thread
            ON messages(thread_id, created_at);

        CREATE TABLE IF NOT EXISTS user_stripe_accounts (
            id           TEXT PRIMARY KEY,
            user_id      TEXT NOT NULL UNIQUE REFERENCES users(id) ON DELETE CASCADE,
            api_key      TEXT NOT NULL,
            is_connected INTEGER NOT NULL DEFAULT 0,
            created_at   TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at   TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS user_elster_accounts (
            id             TEXT PRIMARY KEY,
            user_id        TEXT NOT NULL UNIQUE REFERENCES users(id) ON DELETE CASCADE,
            tax_id         TEXT NOT NULL,
            is_connected   INTEGER NOT NULL DEFAULT 0,
            frequency      TEXT NOT NULL DEFAULT 'quarterly',
            full_name      TEXT,
            street_address TEXT,
            city           TEXT,
            postal_code    TEXT,
            bank_name      TEXT,
            iban           TEXT,
            created_at     TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at     TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS transactions (
            id                 TEXT PRIMARY KEY,
            user_id            TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            stripe_id          TEXT,
            date               TEXT NOT NULL,
            description        TEXT NOT NULL,
            amount             REAL NOT NULL,
            currency           TEXT NOT NULL DEFAULT 'EUR',
            status             TEXT NOT NULL DEFAULT 'succeeded',
            tax_amount         REAL,
            is_expense_claimed INTEGER NOT NULL DEFAULT 0,
            created_at         TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_transactions_user
            ON transactions(user_id, date);

        CREATE TABLE IF NOT EXISTS submissions (
            id         TEXT PRIMARY KEY,
            user_id    TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            timestamp  TEXT NOT NULL DEFAULT (datetime('now')),
            period     TEXT NOT NULL,
            status     TEXT NOT NULL DEFAULT 'submitted',
            UNIQUE(user_id, period)
        );

        CREATE TABLE IF NOT EXISTS submission_transactions (
            submission_id  TEXT NOT NULL REFERENCES submissions(id) ON DELETE CASCADE,
            transaction_id TEXT NOT NULL REFERENCES transactions(id) ON DELETE CASCADE,
            PRIMARY KEY (submission_id, transaction_id)
        );

        -- Marketing collections are persisted per user (they were throwaway
        -- in-memory maps in the prototype).
        CREATE TABLE IF NOT EXISTS marketing_channels (
            id              TEXT PRIMARY KEY,
            user_id         TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            platform        TEXT NOT NULL,
            url             TEXT NOT NULL,
            api_credentials TEXT,
            created_at      TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS marketing_topics (
            id         TEXT PRIMARY KEY,
            user_id    TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            topic      TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS marketing_posts (
            id           TEXT PRIMARY KEY,
            user_id      TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            channel_id   TEXT,
            topic_id     TEXT,
            content      TEXT NOT NULL,
            status       TEXT NOT NULL DEFAULT 'draft',
            scheduled_at TEXT,
            created_at   TEXT NOT NULL DEFAULT (datetime('now'))
        );
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
