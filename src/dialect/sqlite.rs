use super::Dialect;

/// SQLite dialect implementation of the `Dialect` trait.
///
/// SQLite's `LIKE` is already case-insensitive for ASCII, so only the schema
/// differs from the defaults.
pub struct SqliteDialect;

impl Dialect for SqliteDialect {
    fn schema() -> &'static [&'static str] {
        &[
            r#"CREATE TABLE IF NOT EXISTS photos (
                id INTEGER PRIMARY KEY,
                filename TEXT NOT NULL,
                base_uri TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT ''
            );"#,
            r#"CREATE TABLE IF NOT EXISTS tags (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL
            );"#,
            r#"CREATE TABLE IF NOT EXISTS photo_tags (
                photo_id INTEGER,
                tag_id INTEGER,
                PRIMARY KEY (photo_id, tag_id),
                FOREIGN KEY (photo_id) REFERENCES photos(id) ON DELETE CASCADE,
                FOREIGN KEY (tag_id) REFERENCES tags(id) ON DELETE CASCADE
            );"#,
        ]
    }
}
