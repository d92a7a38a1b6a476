use percent_encoding::percent_decode_str;
use warp::{Filter, Rejection, Reply};

use crate::db::{DbPool, LookupFilter, SearchCriteria, User};
use crate::search_filter::{self, SearchError};
use crate::warp_helpers::{validation, with_caller, with_db};

/// Only elevated roles may search uploads other than their own. A search with
/// no owner covers every user and is therefore elevated-only too.
pub fn ensure_can_search_owner(caller: &User, target: Option<i64>) -> Result<(), SearchError> {
    if caller.role.is_elevated() || target == Some(caller.id) {
        Ok(())
    } else {
        Err(SearchError::Forbidden)
    }
}

fn decode_segment(raw: &str) -> Result<String, Rejection> {
    percent_decode_str(raw)
        .decode_utf8()
        .map(|s| s.into_owned())
        .map_err(|_| validation("Path segment is not valid UTF-8"))
}

pub async fn search_photos(
    criteria: SearchCriteria,
    db_pool: DbPool,
) -> Result<impl Reply, Rejection> {
    if !criteria.has_keywords_or_tags() {
        return Err(SearchError::MissingCriteria.into());
    }

    let photos = search_filter::search_photos(&db_pool, &criteria).await?;
    Ok(warp::reply::json(&photos))
}

pub async fn search_photos_by_user(
    criteria: SearchCriteria,
    caller: User,
    db_pool: DbPool,
) -> Result<impl Reply, Rejection> {
    // Authorization happens before the query runs
    ensure_can_search_owner(&caller, criteria.user_id)?;

    log::info!(
        "User {} ({}) searching uploads of {:?}",
        caller.id,
        caller.role,
        criteria.user_id
    );
    let photos = search_filter::search_photos_by_user(&db_pool, &criteria).await?;
    Ok(warp::reply::json(&photos))
}

pub async fn get_photos_by_description(
    description: String,
    lookup: LookupFilter,
    db_pool: DbPool,
) -> Result<impl Reply, Rejection> {
    let description = decode_segment(&description)?;
    let photos = search_filter::find_by_description(&db_pool, &description, &lookup).await?;
    Ok(warp::reply::json(&photos))
}

pub async fn get_photos_by_tag(
    tag_name: String,
    lookup: LookupFilter,
    db_pool: DbPool,
) -> Result<impl Reply, Rejection> {
    let tag_name = decode_segment(&tag_name)?;
    let photos = search_filter::find_by_tag_name(&db_pool, &tag_name, &lookup).await?;
    Ok(warp::reply::json(&photos))
}

pub fn build_search_routes(
    db_pool: DbPool,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    let search = warp::path!("api" / "photos" / "search")
        .and(warp::post())
        .and(warp::body::json::<SearchCriteria>())
        .and(with_db(db_pool.clone()))
        .and_then(search_photos);

    let search_by_user = warp::path!("api" / "photos" / "search" / "user")
        .and(warp::post())
        .and(warp::body::json::<SearchCriteria>())
        .and(with_caller(db_pool.clone()))
        .and(with_db(db_pool.clone()))
        .and_then(search_photos_by_user);

    let by_tag = warp::path!("api" / "photos" / "search" / "tag" / String)
        .and(warp::get())
        .and(warp::query::<LookupFilter>())
        .and(with_db(db_pool.clone()))
        .and_then(get_photos_by_tag);

    let by_description = warp::path!("api" / "photos" / "search" / String)
        .and(warp::get())
        .and(warp::query::<LookupFilter>())
        .and(with_db(db_pool))
        .and_then(get_photos_by_description);

    search.or(search_by_user).or(by_tag).or(by_description)
}
