//! PostgreSQL schema for accounts, transactions and the ledger

use anyhow::Result;
use sqlx::PgPool;

/// Create tables, indexes and the append-only guard if missing
pub async fn init_schema(pool: &PgPool) -> Result<()> {
    tracing::info!("Initializing ledger schema...");

    for (name, sql) in [
        ("accounts", CREATE_ACCOUNTS_TABLE),
        ("transactions", CREATE_TRANSACTIONS_TABLE),
        ("transactions stale index", CREATE_TRANSACTIONS_STATUS_INDEX),
        ("ledger_entries", CREATE_LEDGER_ENTRIES_TABLE),
        ("ledger_entries account index", CREATE_LEDGER_ENTRIES_ACCOUNT_INDEX),
        ("append-only function", CREATE_APPEND_ONLY_FUNCTION),
        ("append-only trigger drop", DROP_APPEND_ONLY_TRIGGER),
        ("append-only trigger", CREATE_APPEND_ONLY_TRIGGER),
    ] {
        sqlx::query(sql)
            .execute(pool)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to create {}: {}", name, e))?;
    }

    tracing::info!("Ledger schema initialized successfully");
    Ok(())
}

const CREATE_ACCOUNTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS accounts (
    id          TEXT PRIMARY KEY,
    owner_id    TEXT NOT NULL,
    status      SMALLINT NOT NULL DEFAULT 1,
    currency    CHAR(3) NOT NULL,
    created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

const CREATE_TRANSACTIONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS transactions (
    id               TEXT PRIMARY KEY,
    from_account     TEXT NOT NULL,
    to_account       TEXT NOT NULL,
    amount           NUMERIC(30, 8) NOT NULL CHECK (amount > 0),
    currency         CHAR(3) NOT NULL,
    status           SMALLINT NOT NULL,
    idempotency_key  TEXT NOT NULL UNIQUE,
    error_message    TEXT,
    created_at       TIMESTAMPTZ NOT NULL,
    updated_at       TIMESTAMPTZ NOT NULL,
    CHECK (from_account <> to_account)
)
"#;

const CREATE_TRANSACTIONS_STATUS_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_transactions_status_updated
    ON transactions (status, updated_at)
"#;

const CREATE_LEDGER_ENTRIES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS ledger_entries (
    id              TEXT PRIMARY KEY,
    account_id      TEXT NOT NULL,
    transaction_id  TEXT NOT NULL REFERENCES transactions (id),
    entry_type      SMALLINT NOT NULL,
    amount          NUMERIC(30, 8) NOT NULL CHECK (amount > 0),
    created_at      TIMESTAMPTZ NOT NULL,
    UNIQUE (transaction_id, entry_type)
)
"#;

const CREATE_LEDGER_ENTRIES_ACCOUNT_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_ledger_entries_account
    ON ledger_entries (account_id, created_at)
"#;

const CREATE_APPEND_ONLY_FUNCTION: &str = r#"
CREATE OR REPLACE FUNCTION ledger_entries_append_only() RETURNS trigger AS $$
BEGIN
    RAISE EXCEPTION 'ledger_entries is append-only';
END;
$$ LANGUAGE plpgsql
"#;

const DROP_APPEND_ONLY_TRIGGER: &str =
    "DROP TRIGGER IF EXISTS trg_ledger_entries_append_only ON ledger_entries";

const CREATE_APPEND_ONLY_TRIGGER: &str = r#"
CREATE TRIGGER trg_ledger_entries_append_only
    BEFORE UPDATE OR DELETE ON ledger_entries
    FOR EACH ROW EXECUTE FUNCTION ledger_entries_append_only()
"#;
