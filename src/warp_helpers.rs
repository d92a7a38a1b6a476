use crate::db::{DbPool, User};
use crate::search_filter::SearchError;
use serde::Serialize;
use std::convert::Infallible;

use warp::{reject, Filter, Rejection, Reply};

/// Header carrying the authenticated user id, set by the upstream auth gateway
pub const CALLER_HEADER: &str = "x-user-id";

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
    pub timestamp: String,
}

#[derive(Debug)]
pub struct DatabaseError {
    pub message: String,
}

impl reject::Reject for DatabaseError {}

#[derive(Debug)]
pub struct NotFoundError {
    pub message: String,
}

impl reject::Reject for NotFoundError {}

#[derive(Debug)]
pub struct ValidationError {
    pub message: String,
}

impl reject::Reject for ValidationError {}

#[derive(Debug)]
pub struct ForbiddenError;
impl reject::Reject for ForbiddenError {}

#[derive(Debug)]
pub struct UnauthorizedError;
impl reject::Reject for UnauthorizedError {}

pub fn database_rejection(context: &str, e: sqlx::Error) -> Rejection {
    log::error!("{}: {}", context, e);
    reject::custom(DatabaseError {
        message: format!("{}: {}", context, e),
    })
}

pub fn not_found(message: impl Into<String>) -> Rejection {
    reject::custom(NotFoundError {
        message: message.into(),
    })
}

pub fn validation(message: impl Into<String>) -> Rejection {
    reject::custom(ValidationError {
        message: message.into(),
    })
}

impl From<SearchError> for Rejection {
    fn from(err: SearchError) -> Self {
        match err {
            SearchError::Database(e) => database_rejection("Search error", e),
            SearchError::Forbidden => reject::custom(ForbiddenError),
            // Not-found lookups are reported as bad requests, like the other validation failures
            SearchError::MissingCriteria
            | SearchError::ConflictingFilters
            | SearchError::DescriptionNotFound
            | SearchError::TagNotFound => validation(err.to_string()),
        }
    }
}

pub fn with_db(db_pool: DbPool) -> impl Filter<Extract = (DbPool,), Error = Infallible> + Clone {
    warp::any().map(move || db_pool.clone())
}

/// Resolves the calling user from [`CALLER_HEADER`]; rejects with 401 when the
/// header is missing, malformed or names an unknown user.
pub fn with_caller(
    db_pool: DbPool,
) -> impl Filter<Extract = (User,), Error = Rejection> + Clone {
    warp::header::optional::<String>(CALLER_HEADER)
        .and(with_db(db_pool))
        .and_then(resolve_caller)
}

async fn resolve_caller(header: Option<String>, db_pool: DbPool) -> Result<User, Rejection> {
    let user_id = header
        .as_deref()
        .and_then(|value| value.trim().parse::<i64>().ok())
        .ok_or_else(|| reject::custom(UnauthorizedError))?;

    match User::find_by_id(&db_pool, user_id).await {
        Ok(Some(user)) => Ok(user),
        Ok(None) => Err(reject::custom(UnauthorizedError)),
        Err(e) => Err(database_rejection("Database error", e)),
    }
}

pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let code;
    let message;
    let timestamp = chrono::Utc::now().to_rfc3339();

    if err.is_not_found() {
        code = warp::http::StatusCode::NOT_FOUND;
        message = "Not Found".to_string();
    } else if let Some(database_error) = err.find::<DatabaseError>() {
        code = warp::http::StatusCode::INTERNAL_SERVER_ERROR;
        message = database_error.message.clone();
    } else if let Some(not_found_error) = err.find::<NotFoundError>() {
        code = warp::http::StatusCode::NOT_FOUND;
        message = not_found_error.message.clone();
    } else if let Some(validation_error) = err.find::<ValidationError>() {
        code = warp::http::StatusCode::BAD_REQUEST;
        message = validation_error.message.clone();
    } else if err.find::<UnauthorizedError>().is_some() {
        code = warp::http::StatusCode::UNAUTHORIZED;
        message = "Not authenticated".to_string();
    } else if err.find::<ForbiddenError>().is_some() {
        code = warp::http::StatusCode::FORBIDDEN;
        message = "Not enough permissions".to_string();
    } else if let Some(invalid_query) = err.find::<warp::reject::InvalidQuery>() {
        code = warp::http::StatusCode::BAD_REQUEST;
        message = invalid_query.to_string();
    } else if let Some(invalid_body) = err.find::<warp::filters::body::BodyDeserializeError>() {
        code = warp::http::StatusCode::BAD_REQUEST;
        message = invalid_body.to_string();
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        code = warp::http::StatusCode::PAYLOAD_TOO_LARGE;
        message = "Payload too large".to_string();
    } else if err.find::<warp::reject::UnsupportedMediaType>().is_some() {
        code = warp::http::StatusCode::UNSUPPORTED_MEDIA_TYPE;
        message = "Unsupported media type".to_string();
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        code = warp::http::StatusCode::METHOD_NOT_ALLOWED;
        message = "Method not allowed".to_string();
    } else {
        log::error!("Unhandled rejection: {:?}", err);
        code = warp::http::StatusCode::INTERNAL_SERVER_ERROR;
        message = "Internal server error".to_string();
    }

    let error_response = ErrorResponse {
        error: message,
        code: code.as_u16(),
        timestamp,
    };

    Ok(warp::reply::with_status(
        warp::reply::json(&error_response),
        code,
    ))
}

pub fn cors() -> warp::cors::Builder {
    warp::cors()
        .allow_any_origin()
        .allow_headers(vec!["content-type", "authorization", CALLER_HEADER])
        .allow_methods(vec!["GET", "POST", "PUT", "PATCH", "DELETE", "OPTIONS"])
}

#[cfg(test)]
mod tests {
    use super::*;
    use warp::http::StatusCode;

    async fn status_of(rejection: Rejection) -> StatusCode {
        handle_rejection(rejection)
            .await
            .unwrap()
            .into_response()
            .status()
    }

    #[tokio::test]
    async fn test_search_errors_map_to_status_codes() {
        assert_eq!(
            status_of(SearchError::MissingCriteria.into()).await,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(SearchError::ConflictingFilters.into()).await,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(SearchError::DescriptionNotFound.into()).await,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(SearchError::TagNotFound.into()).await,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(SearchError::Forbidden.into()).await,
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_of(SearchError::Database(sqlx::Error::RowNotFound).into()).await,
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_other_rejections() {
        assert_eq!(status_of(warp::reject::not_found()).await, StatusCode::NOT_FOUND);
        assert_eq!(
            status_of(reject::custom(UnauthorizedError)).await,
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(status_of(not_found("Photo not found")).await, StatusCode::NOT_FOUND);
    }
}
