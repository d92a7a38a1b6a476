use chrono::NaiveDate;
use photo_share::db::{create_in_memory_pool, DbPool, LookupFilter, Photo, Role, SearchCriteria, User};
use photo_share::search_filter::{self, PhotoFilter, SearchError};

struct Catalog {
    pool: DbPool,
    alice: User,
    bob: User,
    sunset: Photo,
    city: Photo,
}

/// Two photos: a highly rated "sunset beach" tagged nature, and a poorly rated
/// "city night" tagged urban. Both were created on 2023-05-01.
async fn catalog() -> Catalog {
    let pool = create_in_memory_pool().await.unwrap();
    let alice = User::create(&pool, "alice", "alice@example.com").await.unwrap();
    let bob = User::create(&pool, "bob", "bob@example.com").await.unwrap();

    let sunset = Photo::create(&pool, alice.id, "/p/1.jpg", "sunset beach", &["nature".to_string()])
        .await
        .unwrap();
    let city = Photo::create(&pool, bob.id, "/p/2.jpg", "city night", &["urban".to_string()])
        .await
        .unwrap();

    Photo::rate(&pool, sunset.id, alice.id, 4).await.unwrap();
    Photo::rate(&pool, sunset.id, bob.id, 5).await.unwrap();
    Photo::rate(&pool, city.id, alice.id, 2).await.unwrap();

    sqlx::query("UPDATE photos SET created_at = '2023-05-01 10:00:00'")
        .execute(&pool)
        .await
        .unwrap();

    Catalog {
        pool,
        alice,
        bob,
        sunset,
        city,
    }
}

fn ids(photos: &[Photo]) -> Vec<i64> {
    photos.iter().map(|p| p.id).collect()
}

#[tokio::test]
async fn test_catalog_scenario() {
    let c = catalog().await;

    let by_keyword = search_filter::search_photos(
        &c.pool,
        &SearchCriteria {
            keywords: Some("sunset".to_string()),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(ids(&by_keyword), vec![c.sunset.id]);
    assert_eq!(by_keyword[0].rating, 4.5);

    let by_rating = search_filter::search_photos(
        &c.pool,
        &SearchCriteria {
            min_rating: Some(3.0),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(ids(&by_rating), vec![c.sunset.id]);

    let by_tag = search_filter::search_photos(
        &c.pool,
        &SearchCriteria {
            tags: Some(vec!["urban".to_string()]),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(ids(&by_tag), vec![c.city.id]);
    assert_eq!(by_tag[0].tags[0].name, "urban");
}

#[tokio::test]
async fn test_criteria_from_json_body() {
    let c = catalog().await;
    let criteria: SearchCriteria = serde_json::from_str(
        r#"{"keyword": "NIGHT", "tags": ["urban", "nature"], "max_rating": 3.0}"#,
    )
    .unwrap();

    let photos = search_filter::search_photos(&c.pool, &criteria).await.unwrap();
    assert_eq!(ids(&photos), vec![c.city.id]);

    let filter = PhotoFilter::from_criteria(&criteria);
    assert!(photos.iter().all(|p| filter.matches(p)));
}

#[tokio::test]
async fn test_per_user_search_restricts_owner() {
    let c = catalog().await;
    let criteria = SearchCriteria {
        user_id: Some(c.bob.id),
        min_rating: Some(1.0),
        ..Default::default()
    };

    let photos = search_filter::search_photos_by_user(&c.pool, &criteria).await.unwrap();
    assert_eq!(ids(&photos), vec![c.city.id]);
    assert!(photos.iter().all(|p| p.user_id == c.bob.id));

    let everyone = search_filter::search_photos_by_user(&c.pool, &SearchCriteria::default())
        .await
        .unwrap();
    assert_eq!(ids(&everyone), vec![c.sunset.id, c.city.id]);
}

#[tokio::test]
async fn test_lookups_and_their_errors() {
    let c = catalog().await;
    let upload_day = NaiveDate::from_ymd_opt(2023, 5, 1);

    let photos = search_filter::find_by_tag_name(
        &c.pool,
        "nature",
        &LookupFilter {
            created_at: upload_day,
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(ids(&photos), vec![c.sunset.id]);

    let filtered_out = search_filter::find_by_description(
        &c.pool,
        "city",
        &LookupFilter {
            rating_filter: Some(4.0),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert!(filtered_out.is_empty());

    let old_day = search_filter::find_by_tag_name(
        &c.pool,
        "urban",
        &LookupFilter {
            created_at: NaiveDate::from_ymd_opt(2000, 1, 1),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert!(old_day.is_empty());

    let missing = search_filter::find_by_description(&c.pool, "mountain", &LookupFilter::default()).await;
    assert!(matches!(missing, Err(SearchError::DescriptionNotFound)));

    let conflicting = search_filter::find_by_tag_name(
        &c.pool,
        "nature",
        &LookupFilter {
            rating_filter: Some(1.0),
            created_at: upload_day,
        },
    )
    .await;
    assert!(matches!(conflicting, Err(SearchError::ConflictingFilters)));
}

#[tokio::test]
async fn test_deleted_photo_disappears_from_search() {
    let c = catalog().await;
    let admin = User::set_role(&c.pool, c.alice.id, Role::Admin)
        .await
        .unwrap()
        .unwrap();
    assert!(admin.role.is_elevated());

    assert!(Photo::delete(&c.pool, c.city.id).await.unwrap());
    let photos = search_filter::search_photos(
        &c.pool,
        &SearchCriteria {
            tags: Some(vec!["urban".to_string()]),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert!(photos.is_empty());

    // The tag itself survives its last photo
    let lookup = search_filter::find_by_tag_name(&c.pool, "urban", &LookupFilter::default())
        .await
        .unwrap();
    assert!(lookup.is_empty());
}
