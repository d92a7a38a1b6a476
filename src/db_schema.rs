use sqlx::SqlitePool;

// Schema definitions
pub const USERS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL,
    email TEXT NOT NULL UNIQUE,
    role TEXT NOT NULL DEFAULT 'user' CHECK(role IN ('user', 'moderator', 'admin')),
    created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
)
"#;

pub const PHOTOS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS photos (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL,
    url TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    rating REAL NOT NULL DEFAULT 0 CHECK(rating >= 0),

    -- Stored as 'YYYY-MM-DD HH:MM:SS' (UTC); range and day filters compare this text
    created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
    updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
    FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
)
"#;

pub const TAGS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS tags (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE
)
"#;

// Many-to-many bridge between photos and tags
pub const PHOTO_TAG_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS photo_tag (
    photo_id INTEGER NOT NULL,
    tag_id INTEGER NOT NULL,
    PRIMARY KEY (photo_id, tag_id),
    FOREIGN KEY (photo_id) REFERENCES photos(id) ON DELETE CASCADE,
    FOREIGN KEY (tag_id) REFERENCES tags(id) ON DELETE CASCADE
)
"#;

pub const COMMENTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS comments (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    photo_id INTEGER NOT NULL,
    user_id INTEGER NOT NULL,
    content TEXT NOT NULL,
    created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
    updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
    FOREIGN KEY (photo_id) REFERENCES photos(id) ON DELETE CASCADE,
    FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
)
"#;

pub const RATINGS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS ratings (
    photo_id INTEGER NOT NULL,
    user_id INTEGER NOT NULL,
    vote INTEGER NOT NULL CHECK(vote BETWEEN 1 AND 5),
    created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
    PRIMARY KEY (photo_id, user_id),
    FOREIGN KEY (photo_id) REFERENCES photos(id) ON DELETE CASCADE,
    FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
)
"#;

pub const SCHEMA_SQL: &[&str] = &[
    USERS_TABLE,
    PHOTOS_TABLE,
    "CREATE INDEX IF NOT EXISTS idx_photos_user_id ON photos(user_id);",
    "CREATE INDEX IF NOT EXISTS idx_photos_rating ON photos(rating);",
    "CREATE INDEX IF NOT EXISTS idx_photos_created_at ON photos(created_at);",
    TAGS_TABLE,
    PHOTO_TAG_TABLE,
    "CREATE INDEX IF NOT EXISTS idx_photo_tag_tag_id ON photo_tag(tag_id);",
    COMMENTS_TABLE,
    "CREATE INDEX IF NOT EXISTS idx_comments_photo_id ON comments(photo_id);",
    RATINGS_TABLE,
];

pub async fn initialize_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    for sql in SCHEMA_SQL {
        sqlx::query(sql).execute(pool).await?;
    }
    Ok(())
}
