use warp::Filter;

use crate::db::DbPool;
use crate::handlers_comment::build_comment_routes;
use crate::handlers_health::build_health_routes;
use crate::handlers_photo::build_photo_routes;
use crate::handlers_search::build_search_routes;
use crate::handlers_user::build_user_routes;

/// All API routes, without CORS, logging or rejection recovery.
pub fn build_routes(
    db_pool: DbPool,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    // Search paths share the /api/photos prefix and go first
    build_health_routes(db_pool.clone())
        .or(build_search_routes(db_pool.clone()))
        .or(build_photo_routes(db_pool.clone()))
        .or(build_comment_routes(db_pool.clone()))
        .or(build_user_routes(db_pool))
}
