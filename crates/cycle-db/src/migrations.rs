use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id          TEXT PRIMARY KEY,
                name        TEXT NOT NULL,
                email       TEXT NOT NULL UNIQUE,
                password    TEXT NOT NULL,
                verified    INTEGER NOT NULL DEFAULT 0,
                avatar_url  TEXT,
                avatar_id   TEXT,
                created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                updated_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            -- seq keeps the list in issue order
            CREATE TABLE refresh_tokens (
                seq         INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                token       TEXT NOT NULL
            );

            CREATE INDEX idx_refresh_tokens_user
                ON refresh_tokens(user_id, token);

            CREATE TABLE ephemeral_tokens (
                owner_id    TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                purpose     TEXT NOT NULL,
                token_hash  TEXT NOT NULL,
                created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                expires_at  TEXT NOT NULL,
                PRIMARY KEY (owner_id, purpose)
            );

            CREATE INDEX idx_ephemeral_tokens_expiry
                ON ephemeral_tokens(expires_at);

            CREATE TABLE products (
                id              TEXT PRIMARY KEY,
                owner_id        TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                name            TEXT NOT NULL,
                description     TEXT NOT NULL,
                price           REAL NOT NULL,
                category        TEXT NOT NULL,
                purchasing_date TEXT NOT NULL,
                thumbnail       TEXT,
                created_at      TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                updated_at      TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE INDEX idx_products_category
                ON products(category, created_at);

            CREATE INDEX idx_products_owner
                ON products(owner_id, created_at);

            CREATE TABLE product_images (
                seq         INTEGER PRIMARY KEY AUTOINCREMENT,
                product_id  TEXT NOT NULL REFERENCES products(id) ON DELETE CASCADE,
                image_id    TEXT NOT NULL,
                url         TEXT NOT NULL
            );

            CREATE INDEX idx_product_images_product
                ON product_images(product_id, seq);

            CREATE TABLE conversations (
                id              TEXT PRIMARY KEY,
                participants_id TEXT NOT NULL UNIQUE,
                participant_a   TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                participant_b   TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                created_at      TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                updated_at      TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE TABLE chats (
                seq             INTEGER PRIMARY KEY AUTOINCREMENT,
                id              TEXT NOT NULL UNIQUE,
                conversation_id TEXT NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
                sent_by         TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                content         TEXT NOT NULL,
                timestamp       TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                viewed          INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX idx_chats_conversation
                ON chats(conversation_id, seq);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
