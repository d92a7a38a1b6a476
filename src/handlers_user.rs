use serde::Deserialize;
use warp::{reject, Filter, Rejection, Reply};

use crate::db::{DbPool, Role, User};
use crate::warp_helpers::{
    database_rejection, not_found, validation, with_caller, with_db, ForbiddenError,
};

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    pub role: Role,
}

pub async fn create_user(
    request: CreateUserRequest,
    db_pool: DbPool,
) -> Result<impl Reply, Rejection> {
    if request.username.trim().is_empty() || !request.email.contains('@') {
        return Err(validation("A username and a valid email are required"));
    }

    match User::create(&db_pool, &request.username, &request.email).await {
        Ok(user) => {
            log::info!("Registered user {} ({})", user.id, user.username);
            Ok(warp::reply::with_status(
                warp::reply::json(&user),
                warp::http::StatusCode::CREATED,
            ))
        }
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            Err(validation("Email is already registered"))
        }
        Err(e) => Err(database_rejection("Failed to create user", e)),
    }
}

pub async fn get_user(user_id: i64, db_pool: DbPool) -> Result<impl Reply, Rejection> {
    match User::find_by_id(&db_pool, user_id).await {
        Ok(Some(user)) => Ok(warp::reply::json(&user)),
        Ok(None) => Err(not_found(format!("User with ID {} not found", user_id))),
        Err(e) => Err(database_rejection("Database error", e)),
    }
}

fn ensure_admin(caller: &User) -> Result<(), Rejection> {
    if caller.role == Role::Admin {
        Ok(())
    } else {
        Err(reject::custom(ForbiddenError))
    }
}

pub async fn list_users(caller: User, db_pool: DbPool) -> Result<impl Reply, Rejection> {
    ensure_admin(&caller)?;

    let users = User::list_all(&db_pool)
        .await
        .map_err(|e| database_rejection("Error fetching users", e))?;
    Ok(warp::reply::json(&users))
}

pub async fn delete_user(
    user_id: i64,
    caller: User,
    db_pool: DbPool,
) -> Result<impl Reply, Rejection> {
    ensure_admin(&caller)?;

    match User::delete(&db_pool, user_id).await {
        Ok(true) => {
            log::info!("User {} deleted account {}", caller.id, user_id);
            Ok(warp::reply::json(&serde_json::json!({ "detail": "User deleted" })))
        }
        Ok(false) => Err(not_found(format!("User with ID {} not found", user_id))),
        Err(e) => Err(database_rejection("Failed to delete user", e)),
    }
}

/// Role changes are reserved for administrators.
pub async fn set_user_role(
    user_id: i64,
    request: RoleRequest,
    caller: User,
    db_pool: DbPool,
) -> Result<impl Reply, Rejection> {
    ensure_admin(&caller)?;

    match User::set_role(&db_pool, user_id, request.role).await {
        Ok(Some(user)) => {
            log::info!("User {} set role of {} to {}", caller.id, user.id, user.role);
            Ok(warp::reply::json(&user))
        }
        Ok(None) => Err(not_found(format!("User with ID {} not found", user_id))),
        Err(e) => Err(database_rejection("Failed to update role", e)),
    }
}

pub fn build_user_routes(
    db_pool: DbPool,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    let create = warp::path!("api" / "users")
        .and(warp::post())
        .and(warp::body::json::<CreateUserRequest>())
        .and(with_db(db_pool.clone()))
        .and_then(create_user);

    let list = warp::path!("api" / "users" / "all")
        .and(warp::get())
        .and(with_caller(db_pool.clone()))
        .and(with_db(db_pool.clone()))
        .and_then(list_users);

    let get = warp::path!("api" / "users" / i64)
        .and(warp::get())
        .and(with_db(db_pool.clone()))
        .and_then(get_user);

    let set_role = warp::path!("api" / "users" / i64 / "role")
        .and(warp::put())
        .and(warp::body::json::<RoleRequest>())
        .and(with_caller(db_pool.clone()))
        .and(with_db(db_pool.clone()))
        .and_then(set_user_role);

    let delete = warp::path!("api" / "users" / i64)
        .and(warp::delete())
        .and(with_caller(db_pool.clone()))
        .and(with_db(db_pool))
        .and_then(delete_user);

    create.or(list).or(get).or(set_role).or(delete)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_in_memory_pool;
    use warp::http::StatusCode;

    fn rejection_of<T>(result: Result<T, Rejection>) -> Rejection {
        match result {
            Ok(_) => panic!("expected a rejection"),
            Err(rejection) => rejection,
        }
    }

    fn request(username: &str, email: &str) -> CreateUserRequest {
        CreateUserRequest {
            username: username.to_string(),
            email: email.to_string(),
        }
    }

    #[tokio::test]
    async fn test_duplicate_email_is_a_bad_request() {
        let pool = create_in_memory_pool().await.unwrap();

        let reply = create_user(request("alice", "alice@example.com"), pool.clone())
            .await
            .unwrap()
            .into_response();
        assert_eq!(reply.status(), StatusCode::CREATED);

        let rejection =
            rejection_of(create_user(request("alice2", "alice@example.com"), pool).await);
        assert!(rejection
            .find::<crate::warp_helpers::ValidationError>()
            .is_some());
    }

    #[tokio::test]
    async fn test_only_admin_sets_roles() {
        let pool = create_in_memory_pool().await.unwrap();
        let admin = User::create(&pool, "root", "root@example.com").await.unwrap();
        let admin = User::set_role(&pool, admin.id, Role::Admin)
            .await
            .unwrap()
            .unwrap();
        let moderator = User::create(&pool, "mod", "mod@example.com").await.unwrap();
        let moderator = User::set_role(&pool, moderator.id, Role::Moderator)
            .await
            .unwrap()
            .unwrap();
        let target = User::create(&pool, "bob", "bob@example.com").await.unwrap();

        let rejection = rejection_of(
            set_user_role(
                target.id,
                RoleRequest { role: Role::Admin },
                moderator,
                pool.clone(),
            )
            .await,
        );
        assert!(rejection.find::<ForbiddenError>().is_some());

        set_user_role(target.id, RoleRequest { role: Role::Moderator }, admin, pool.clone())
            .await
            .unwrap();
        let updated = User::find_by_id(&pool, target.id).await.unwrap().unwrap();
        assert_eq!(updated.role, Role::Moderator);
    }

    #[tokio::test]
    async fn test_admin_lists_and_deletes_users() {
        let pool = create_in_memory_pool().await.unwrap();
        let admin = User::create(&pool, "root", "root@example.com").await.unwrap();
        let admin = User::set_role(&pool, admin.id, Role::Admin)
            .await
            .unwrap()
            .unwrap();
        let regular = User::create(&pool, "bob", "bob@example.com").await.unwrap();

        let rejection = rejection_of(list_users(regular.clone(), pool.clone()).await);
        assert!(rejection.find::<ForbiddenError>().is_some());
        let rejection = rejection_of(delete_user(admin.id, regular.clone(), pool.clone()).await);
        assert!(rejection.find::<ForbiddenError>().is_some());

        let reply = list_users(admin.clone(), pool.clone())
            .await
            .unwrap()
            .into_response();
        assert_eq!(reply.status(), StatusCode::OK);

        let reply = delete_user(regular.id, admin.clone(), pool.clone())
            .await
            .unwrap()
            .into_response();
        assert_eq!(reply.status(), StatusCode::OK);
        assert!(User::find_by_id(&pool, regular.id).await.unwrap().is_none());

        let rejection = rejection_of(delete_user(regular.id, admin, pool).await);
        assert!(rejection
            .find::<crate::warp_helpers::NotFoundError>()
            .is_some());
    }
}
