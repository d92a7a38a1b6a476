use serde::Deserialize;
use warp::{reject, Filter, Rejection, Reply};

use crate::db::{Comment, DbPool, Photo, User};
use crate::warp_helpers::{
    database_rejection, not_found, validation, with_caller, with_db, ForbiddenError,
};

#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    pub content: String,
}

fn validate_content(content: &str) -> Result<(), Rejection> {
    if content.trim().is_empty() {
        return Err(validation("Comment content must not be empty"));
    }
    Ok(())
}

async fn load_comment(db_pool: &DbPool, comment_id: i64) -> Result<Comment, Rejection> {
    match Comment::find_by_id(db_pool, comment_id).await {
        Ok(Some(comment)) => Ok(comment),
        Ok(None) => Err(not_found(format!("Comment with ID {} not found", comment_id))),
        Err(e) => Err(database_rejection("Database error", e)),
    }
}

pub async fn list_comments(photo_id: i64, db_pool: DbPool) -> Result<impl Reply, Rejection> {
    let comments = Comment::list_for_photo(&db_pool, photo_id)
        .await
        .map_err(|e| database_rejection("Error fetching comments", e))?;
    Ok(warp::reply::json(&comments))
}

pub async fn get_comment(comment_id: i64, db_pool: DbPool) -> Result<impl Reply, Rejection> {
    let comment = load_comment(&db_pool, comment_id).await?;
    Ok(warp::reply::json(&comment))
}

pub async fn create_comment(
    photo_id: i64,
    request: CommentRequest,
    caller: User,
    db_pool: DbPool,
) -> Result<impl Reply, Rejection> {
    validate_content(&request.content)?;

    match Photo::find_by_id(&db_pool, photo_id).await {
        Ok(Some(_)) => {}
        Ok(None) => return Err(not_found(format!("Photo with ID {} not found", photo_id))),
        Err(e) => return Err(database_rejection("Database error", e)),
    }

    let comment = Comment::create(&db_pool, photo_id, caller.id, &request.content)
        .await
        .map_err(|e| database_rejection("Failed to create comment", e))?;

    Ok(warp::reply::with_status(
        warp::reply::json(&comment),
        warp::http::StatusCode::CREATED,
    ))
}

/// Only the author may edit a comment.
pub async fn update_comment(
    comment_id: i64,
    request: CommentRequest,
    caller: User,
    db_pool: DbPool,
) -> Result<impl Reply, Rejection> {
    validate_content(&request.content)?;

    let comment = load_comment(&db_pool, comment_id).await?;
    if comment.user_id != caller.id {
        return Err(reject::custom(ForbiddenError));
    }

    match Comment::update_content(&db_pool, comment_id, &request.content).await {
        Ok(Some(updated)) => Ok(warp::reply::json(&updated)),
        Ok(None) => Err(not_found(format!("Comment with ID {} not found", comment_id))),
        Err(e) => Err(database_rejection("Failed to update comment", e)),
    }
}

/// Authors remove their own comments; moderators and admins remove any.
pub async fn delete_comment(
    comment_id: i64,
    caller: User,
    db_pool: DbPool,
) -> Result<impl Reply, Rejection> {
    let comment = load_comment(&db_pool, comment_id).await?;
    if comment.user_id != caller.id && !caller.role.is_elevated() {
        return Err(reject::custom(ForbiddenError));
    }

    Comment::delete(&db_pool, comment_id)
        .await
        .map_err(|e| database_rejection("Failed to delete comment", e))?;
    Ok(warp::reply::json(&comment))
}

pub fn build_comment_routes(
    db_pool: DbPool,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    let list = warp::path!("api" / "photos" / i64 / "comments")
        .and(warp::get())
        .and(with_db(db_pool.clone()))
        .and_then(list_comments);

    let create = warp::path!("api" / "photos" / i64 / "comments")
        .and(warp::post())
        .and(warp::body::json::<CommentRequest>())
        .and(with_caller(db_pool.clone()))
        .and(with_db(db_pool.clone()))
        .and_then(create_comment);

    let get = warp::path!("api" / "comments" / i64)
        .and(warp::get())
        .and(with_db(db_pool.clone()))
        .and_then(get_comment);

    let update = warp::path!("api" / "comments" / i64)
        .and(warp::put())
        .and(warp::body::json::<CommentRequest>())
        .and(with_caller(db_pool.clone()))
        .and(with_db(db_pool.clone()))
        .and_then(update_comment);

    let delete = warp::path!("api" / "comments" / i64)
        .and(warp::delete())
        .and(with_caller(db_pool.clone()))
        .and(with_db(db_pool))
        .and_then(delete_comment);

    list.or(create).or(get).or(update).or(delete)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_in_memory_pool, Role};
    use warp::http::StatusCode;

    fn rejection_of<T>(result: Result<T, Rejection>) -> Rejection {
        match result {
            Ok(_) => panic!("expected a rejection"),
            Err(rejection) => rejection,
        }
    }

    #[tokio::test]
    async fn test_comment_permissions() {
        let pool = create_in_memory_pool().await.unwrap();
        let author = User::create(&pool, "author", "author@example.com")
            .await
            .unwrap();
        let other = User::create(&pool, "other", "other@example.com")
            .await
            .unwrap();
        let photo = Photo::create(&pool, author.id, "/a.jpg", "photo", &[])
            .await
            .unwrap();

        let reply = create_comment(
            photo.id,
            CommentRequest {
                content: "lovely".to_string(),
            },
            author.clone(),
            pool.clone(),
        )
        .await
        .unwrap()
        .into_response();
        assert_eq!(reply.status(), StatusCode::CREATED);

        let reply = get_comment(1, pool.clone()).await.unwrap().into_response();
        assert_eq!(reply.status(), StatusCode::OK);
        let rejection = rejection_of(get_comment(2, pool.clone()).await);
        assert!(rejection
            .find::<crate::warp_helpers::NotFoundError>()
            .is_some());

        let edit = CommentRequest {
            content: "hijacked".to_string(),
        };
        let rejection = rejection_of(update_comment(1, edit, other.clone(), pool.clone()).await);
        assert!(rejection.find::<ForbiddenError>().is_some());

        let rejection = rejection_of(delete_comment(1, other.clone(), pool.clone()).await);
        assert!(rejection.find::<ForbiddenError>().is_some());

        let admin = User::set_role(&pool, other.id, Role::Admin)
            .await
            .unwrap()
            .unwrap();
        let reply = delete_comment(1, admin, pool.clone())
            .await
            .unwrap()
            .into_response();
        assert_eq!(reply.status(), StatusCode::OK);
        assert!(Comment::list_for_photo(&pool, photo.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_comment_on_missing_photo_or_blank_content() {
        let pool = create_in_memory_pool().await.unwrap();
        let author = User::create(&pool, "author", "author@example.com")
            .await
            .unwrap();

        let request = CommentRequest {
            content: "hello".to_string(),
        };
        let rejection = rejection_of(create_comment(99, request, author.clone(), pool.clone()).await);
        assert!(rejection
            .find::<crate::warp_helpers::NotFoundError>()
            .is_some());

        let blank = CommentRequest {
            content: "   ".to_string(),
        };
        let rejection = rejection_of(create_comment(99, blank, author, pool).await);
        assert!(rejection
            .find::<crate::warp_helpers::ValidationError>()
            .is_some());
    }
}
