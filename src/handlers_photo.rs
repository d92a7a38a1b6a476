use serde::{Deserialize, Serialize};
use warp::{reject, Filter, Rejection, Reply};

use crate::db::{parse_tag_names, DbPool, Photo, Tag, User};
use crate::warp_helpers::{
    database_rejection, not_found, validation, with_caller, with_db, ForbiddenError,
};

#[derive(Debug, Deserialize)]
pub struct CreatePhotoRequest {
    /// Location of the already stored image
    pub url: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Space separated tag names
    #[serde(default)]
    pub tags: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePhotoRequest {
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct RatingRequest {
    pub vote: u8,
}

#[derive(Debug, Serialize)]
pub struct RatingResponse {
    pub photo_id: i64,
    pub rating: f64,
}

async fn load_photo(db_pool: &DbPool, photo_id: i64) -> Result<Photo, Rejection> {
    match Photo::find_by_id(db_pool, photo_id).await {
        Ok(Some(photo)) => Ok(photo),
        Ok(None) => Err(not_found(format!("Photo with ID {} not found", photo_id))),
        Err(e) => Err(database_rejection("Database error", e)),
    }
}

/// Owners manage their own photos; elevated roles manage everyone's.
fn ensure_can_manage(caller: &User, photo: &Photo) -> Result<(), Rejection> {
    if caller.role.is_elevated() || caller.id == photo.user_id {
        Ok(())
    } else {
        Err(reject::custom(ForbiddenError))
    }
}

pub async fn create_photo(
    request: CreatePhotoRequest,
    caller: User,
    db_pool: DbPool,
) -> Result<impl Reply, Rejection> {
    if request.url.trim().is_empty() {
        return Err(validation("Photo url must not be empty"));
    }

    let tag_names = request
        .tags
        .as_deref()
        .map(parse_tag_names)
        .unwrap_or_default();
    let description = request.description.unwrap_or_default();

    let photo = Photo::create(&db_pool, caller.id, &request.url, &description, &tag_names)
        .await
        .map_err(|e| database_rejection("Failed to create photo", e))?;

    log::info!("User {} created photo {}", caller.id, photo.id);
    Ok(warp::reply::with_status(
        warp::reply::json(&photo),
        warp::http::StatusCode::CREATED,
    ))
}

pub async fn get_photo(photo_id: i64, db_pool: DbPool) -> Result<impl Reply, Rejection> {
    let photo = load_photo(&db_pool, photo_id).await?;
    Ok(warp::reply::json(&photo))
}

pub async fn update_photo(
    photo_id: i64,
    request: UpdatePhotoRequest,
    caller: User,
    db_pool: DbPool,
) -> Result<impl Reply, Rejection> {
    let photo = load_photo(&db_pool, photo_id).await?;
    ensure_can_manage(&caller, &photo)?;

    match Photo::update_description(&db_pool, photo_id, &request.description).await {
        Ok(Some(updated)) => Ok(warp::reply::json(&updated)),
        Ok(None) => Err(not_found(format!("Photo with ID {} not found", photo_id))),
        Err(e) => Err(database_rejection("Failed to update photo", e)),
    }
}

pub async fn delete_photo(
    photo_id: i64,
    caller: User,
    db_pool: DbPool,
) -> Result<impl Reply, Rejection> {
    let photo = load_photo(&db_pool, photo_id).await?;
    ensure_can_manage(&caller, &photo)?;

    let deleted = Photo::delete(&db_pool, photo_id)
        .await
        .map_err(|e| database_rejection("Failed to delete photo", e))?;
    if !deleted {
        return Err(not_found(format!("Photo with ID {} not found", photo_id)));
    }

    log::info!("User {} deleted photo {}", caller.id, photo_id);
    Ok(warp::reply::json(&serde_json::json!({ "detail": "Photo deleted" })))
}

pub async fn rate_photo(
    photo_id: i64,
    request: RatingRequest,
    caller: User,
    db_pool: DbPool,
) -> Result<impl Reply, Rejection> {
    if !(1..=5).contains(&request.vote) {
        return Err(validation("Vote must be between 1 and 5"));
    }

    match Photo::rate(&db_pool, photo_id, caller.id, request.vote).await {
        Ok(Some(rating)) => Ok(warp::reply::json(&RatingResponse { photo_id, rating })),
        Ok(None) => Err(not_found(format!("Photo with ID {} not found", photo_id))),
        Err(e) => Err(database_rejection("Failed to rate photo", e)),
    }
}

pub async fn list_tags(db_pool: DbPool) -> Result<impl Reply, Rejection> {
    let tags = Tag::list_all(&db_pool)
        .await
        .map_err(|e| database_rejection("Error fetching tags", e))?;
    Ok(warp::reply::json(&tags))
}

pub fn build_photo_routes(
    db_pool: DbPool,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    let create = warp::path!("api" / "photos")
        .and(warp::post())
        .and(warp::body::json::<CreatePhotoRequest>())
        .and(with_caller(db_pool.clone()))
        .and(with_db(db_pool.clone()))
        .and_then(create_photo);

    let get = warp::path!("api" / "photos" / i64)
        .and(warp::get())
        .and(with_db(db_pool.clone()))
        .and_then(get_photo);

    let update = warp::path!("api" / "photos" / i64)
        .and(warp::put())
        .and(warp::body::json::<UpdatePhotoRequest>())
        .and(with_caller(db_pool.clone()))
        .and(with_db(db_pool.clone()))
        .and_then(update_photo);

    let delete = warp::path!("api" / "photos" / i64)
        .and(warp::delete())
        .and(with_caller(db_pool.clone()))
        .and(with_db(db_pool.clone()))
        .and_then(delete_photo);

    let rate = warp::path!("api" / "photos" / i64 / "rating")
        .and(warp::put())
        .and(warp::body::json::<RatingRequest>())
        .and(with_caller(db_pool.clone()))
        .and(with_db(db_pool.clone()))
        .and_then(rate_photo);

    let tags = warp::path!("api" / "tags")
        .and(warp::get())
        .and(with_db(db_pool))
        .and_then(list_tags);

    create.or(get).or(update).or(delete).or(rate).or(tags)
}
