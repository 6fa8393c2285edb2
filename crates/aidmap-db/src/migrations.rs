use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (help requests and reports)");
        conn.execute_batch(
            "
            CREATE TABLE help_requests (
                id           TEXT PRIMARY KEY,
                slug         TEXT NOT NULL,
                urgency      TEXT NOT NULL,
                category     TEXT NOT NULL,
                description  TEXT,
                lat          REAL NOT NULL,
                lng          REAL NOT NULL,
                contact      TEXT NOT NULL,
                name         TEXT,
                views        INTEGER NOT NULL DEFAULT 0,
                help_clicks  INTEGER NOT NULL DEFAULT 0,
                status       TEXT NOT NULL DEFAULT 'pending',
                created_at   TEXT NOT NULL,
                expires_at   TEXT NOT NULL
            );

            CREATE UNIQUE INDEX idx_help_requests_slug
                ON help_requests(slug);

            CREATE INDEX idx_help_requests_status_created
                ON help_requests(status, created_at);

            CREATE TABLE reports (
                id          TEXT PRIMARY KEY,
                request_id  TEXT NOT NULL REFERENCES help_requests(id),
                reason      TEXT NOT NULL,
                details     TEXT,
                created_at  TEXT NOT NULL
            );

            CREATE INDEX idx_reports_request
                ON reports(request_id);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
