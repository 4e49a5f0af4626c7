use super::Dialect;

/// Postgres dialect implementation of the `Dialect` trait.
pub struct PostgresDialect;

impl Dialect for PostgresDialect {
    fn like_operator() -> &'static str {
        "ILIKE"
    }

    fn schema() -> &'static [&'static str] {
        &[
            r#"CREATE TABLE IF NOT EXISTS photos (
                id BIGSERIAL PRIMARY KEY,
                filename TEXT NOT NULL,
                base_uri TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT ''
            );"#,
            r#"CREATE TABLE IF NOT EXISTS tags (
                id BIGSERIAL PRIMARY KEY,
                name TEXT NOT NULL
            );"#,
            r#"CREATE TABLE IF NOT EXISTS photo_tags (
                photo_id BIGINT REFERENCES photos(id) ON DELETE CASCADE,
                tag_id BIGINT REFERENCES tags(id) ON DELETE CASCADE,
                PRIMARY KEY (photo_id, tag_id)
            );"#,
        ]
    }
}
