pub mod config;
pub mod db;
pub mod db_pool;
pub mod db_schema;
pub mod db_types;
pub mod handlers_comment;
pub mod handlers_health;
pub mod handlers_photo;
pub mod handlers_search;
pub mod handlers_user;
pub mod routes;
pub mod search_filter;
pub mod warp_helpers;
