use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection};
use std::collections::HashMap;
use std::fmt;

pub use crate::db_pool::{create_db_pool, create_in_memory_pool, DbPool};
pub use crate::db_types::{LookupFilter, SearchCriteria};

const USER_COLUMNS: &str = "id, username, email, role, created_at";

pub const PHOTO_COLUMNS: &str = "p.id AS id, p.user_id AS user_id, p.url AS url, \
     p.description AS description, p.rating AS rating, \
     p.created_at AS created_at, p.updated_at AS updated_at";

const COMMENT_COLUMNS: &str = "id, photo_id, user_id, content, created_at, updated_at";

/// Closed set of account roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Role {
    User,
    Moderator,
    Admin,
}

impl Role {
    /// Administrators and moderators may query and manage other users' uploads.
    pub fn is_elevated(self) -> bool {
        matches!(self, Role::Admin | Role::Moderator)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Moderator => "moderator",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub created_at: NaiveDateTime,
}

impl User {
    /// Registers a new account. Accounts always start with the `user` role.
    pub async fn create(pool: &DbPool, username: &str, email: &str) -> Result<User, sqlx::Error> {
        let id = sqlx::query("INSERT INTO users (username, email) VALUES (?, ?)")
            .bind(username)
            .bind(email)
            .execute(pool)
            .await?
            .last_insert_rowid();

        Self::find_by_id(pool, id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    pub async fn find_by_id(pool: &DbPool, id: i64) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn set_role(pool: &DbPool, id: i64, role: Role) -> Result<Option<User>, sqlx::Error> {
        let result = sqlx::query("UPDATE users SET role = ? WHERE id = ?")
            .bind(role)
            .bind(id)
            .execute(pool)
            .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        Self::find_by_id(pool, id).await
    }

    pub async fn list_all(pool: &DbPool) -> Result<Vec<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY id"))
            .fetch_all(pool)
            .await
    }

    /// Removes the account together with its photos, comments and votes.
    pub async fn delete(pool: &DbPool, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Tag {
    pub id: i64,
    pub name: String,
}

impl Tag {
    /// Resolves every name to a tag row, reusing existing rows by name.
    ///
    /// `ON CONFLICT DO NOTHING` makes concurrent creation of the same new name
    /// converge on a single row.
    pub async fn find_or_create_many(
        conn: &mut SqliteConnection,
        names: &[String],
    ) -> Result<Vec<Tag>, sqlx::Error> {
        let mut tags = Vec::with_capacity(names.len());
        for name in names {
            sqlx::query("INSERT INTO tags (name) VALUES (?) ON CONFLICT(name) DO NOTHING")
                .bind(name)
                .execute(&mut *conn)
                .await?;

            let tag = sqlx::query_as::<_, Tag>("SELECT id, name FROM tags WHERE name = ?")
                .bind(name)
                .fetch_one(&mut *conn)
                .await?;
            tags.push(tag);
        }
        Ok(tags)
    }

    pub async fn exists(pool: &DbPool, name: &str) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM tags WHERE name = ?)")
            .bind(name)
            .fetch_one(pool)
            .await
    }

    pub async fn list_all(pool: &DbPool) -> Result<Vec<Tag>, sqlx::Error> {
        sqlx::query_as::<_, Tag>("SELECT id, name FROM tags ORDER BY name")
            .fetch_all(pool)
            .await
    }
}

/// Splits a space separated tag string, dropping blanks and repeats.
pub fn parse_tag_names(raw: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for name in raw.split_whitespace() {
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    names
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Photo {
    pub id: i64,
    pub user_id: i64,
    pub url: String,
    pub description: String,
    pub rating: f64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,

    #[sqlx(skip)]
    #[serde(default)]
    pub tags: Vec<Tag>,
}

impl Photo {
    pub fn has_tag_named(&self, name: &str) -> bool {
        self.tags.iter().any(|t| t.name == name)
    }

    /// Inserts the photo and links its tags in one transaction.
    pub async fn create(
        pool: &DbPool,
        user_id: i64,
        url: &str,
        description: &str,
        tag_names: &[String],
    ) -> Result<Photo, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let photo_id =
            sqlx::query("INSERT INTO photos (user_id, url, description) VALUES (?, ?, ?)")
                .bind(user_id)
                .bind(url)
                .bind(description)
                .execute(&mut *tx)
                .await?
                .last_insert_rowid();

        let tags = Tag::find_or_create_many(&mut *tx, tag_names).await?;
        for tag in &tags {
            sqlx::query("INSERT OR IGNORE INTO photo_tag (photo_id, tag_id) VALUES (?, ?)")
                .bind(photo_id)
                .bind(tag.id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        Self::find_by_id(pool, photo_id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    pub async fn find_by_id(pool: &DbPool, id: i64) -> Result<Option<Photo>, sqlx::Error> {
        let photo = sqlx::query_as::<_, Photo>(&format!(
            "SELECT {PHOTO_COLUMNS} FROM photos p WHERE p.id = ?"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?;

        match photo {
            Some(photo) => {
                let mut photos = vec![photo];
                Self::load_tags(pool, &mut photos).await?;
                Ok(photos.pop())
            }
            None => Ok(None),
        }
    }

    pub async fn update_description(
        pool: &DbPool,
        id: i64,
        description: &str,
    ) -> Result<Option<Photo>, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE photos SET description = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
        )
        .bind(description)
        .bind(id)
        .execute(pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        Self::find_by_id(pool, id).await
    }

    /// Deletes the photo; comments, votes and tag links go with it.
    pub async fn delete(pool: &DbPool, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM photos WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Records (or replaces) a user's vote and returns the photo's new mean rating.
    pub async fn rate(
        pool: &DbPool,
        photo_id: i64,
        user_id: i64,
        vote: u8,
    ) -> Result<Option<f64>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM photos WHERE id = ?)")
            .bind(photo_id)
            .fetch_one(&mut *tx)
            .await?;
        if !exists {
            return Ok(None);
        }

        sqlx::query(
            "INSERT INTO ratings (photo_id, user_id, vote) VALUES (?, ?, ?)
             ON CONFLICT(photo_id, user_id) DO UPDATE SET vote = excluded.vote",
        )
        .bind(photo_id)
        .bind(user_id)
        .bind(vote as i64)
        .execute(&mut *tx)
        .await?;

        let rating: f64 = sqlx::query_scalar(
            "UPDATE photos
             SET rating = (SELECT AVG(vote) FROM ratings WHERE photo_id = ?)
             WHERE id = ?
             RETURNING rating",
        )
        .bind(photo_id)
        .bind(photo_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(rating))
    }

    /// True when at least one photo description contains `text` (case-sensitive).
    pub async fn description_exists(pool: &DbPool, text: &str) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM photos WHERE instr(description, ?) > 0)",
        )
        .bind(text)
        .fetch_one(pool)
        .await
    }

    /// Fills in `tags` for every photo with a single batched query.
    pub async fn load_tags(pool: &DbPool, photos: &mut [Photo]) -> Result<(), sqlx::Error> {
        if photos.is_empty() {
            return Ok(());
        }

        let mut builder = QueryBuilder::<Sqlite>::new(
            "SELECT pt.photo_id, t.id, t.name
             FROM photo_tag pt
             JOIN tags t ON t.id = pt.tag_id
             WHERE pt.photo_id IN (",
        );
        let mut separated = builder.separated(", ");
        for photo in photos.iter() {
            separated.push_bind(photo.id);
        }
        separated.push_unseparated(") ORDER BY t.name");

        let rows: Vec<(i64, i64, String)> = builder.build_query_as().fetch_all(pool).await?;

        let mut tag_map: HashMap<i64, Vec<Tag>> = HashMap::new();
        for (photo_id, id, name) in rows {
            tag_map.entry(photo_id).or_default().push(Tag { id, name });
        }

        for photo in photos.iter_mut() {
            photo.tags = tag_map.remove(&photo.id).unwrap_or_default();
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Comment {
    pub id: i64,
    pub photo_id: i64,
    pub user_id: i64,
    pub content: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Comment {
    pub async fn create(
        pool: &DbPool,
        photo_id: i64,
        user_id: i64,
        content: &str,
    ) -> Result<Comment, sqlx::Error> {
        let id = sqlx::query("INSERT INTO comments (photo_id, user_id, content) VALUES (?, ?, ?)")
            .bind(photo_id)
            .bind(user_id)
            .bind(content)
            .execute(pool)
            .await?
            .last_insert_rowid();

        Self::find_by_id(pool, id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    pub async fn find_by_id(pool: &DbPool, id: i64) -> Result<Option<Comment>, sqlx::Error> {
        sqlx::query_as::<_, Comment>(&format!(
            "SELECT {COMMENT_COLUMNS} FROM comments WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn list_for_photo(pool: &DbPool, photo_id: i64) -> Result<Vec<Comment>, sqlx::Error> {
        sqlx::query_as::<_, Comment>(&format!(
            "SELECT {COMMENT_COLUMNS} FROM comments WHERE photo_id = ? ORDER BY id"
        ))
        .bind(photo_id)
        .fetch_all(pool)
        .await
    }

    pub async fn update_content(
        pool: &DbPool,
        id: i64,
        content: &str,
    ) -> Result<Option<Comment>, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE comments SET content = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
        )
        .bind(content)
        .bind(id)
        .execute(pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        Self::find_by_id(pool, id).await
    }

    pub async fn delete(pool: &DbPool, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM comments WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
