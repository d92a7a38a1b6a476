//! Photo search: composes optional criteria into a conjunctive filter over the
//! catalog and executes it.
//!
//! Each optional criterion maps to one [`Predicate`]. A [`PhotoFilter`] is an
//! ordered conjunction of predicates that can be rendered to SQL or evaluated
//! against an already loaded [`Photo`].

use chrono::{NaiveDate, NaiveDateTime};
use log::debug;
use sqlx::{QueryBuilder, Sqlite};

use crate::db::{DbPool, LookupFilter, Photo, SearchCriteria, Tag, PHOTO_COLUMNS};

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("Keywords or tags must be provided for search")]
    MissingCriteria,
    #[error("Choose only one filter parameter at once. Rating or created_at")]
    ConflictingFilters,
    #[error("Description does not exist")]
    DescriptionNotFound,
    #[error("Tag does not exist")]
    TagNotFound,
    #[error("Not enough permissions")]
    Forbidden,
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type SearchResult<T> = Result<T, SearchError>;

// Correlated sub-select over the photo's tags; callers append the tag condition and ")"
const TAG_EXISTS: &str = "EXISTS (SELECT 1 FROM photo_tag pt JOIN tags t ON t.id = pt.tag_id \
     WHERE pt.photo_id = p.id AND ";

/// A single boolean restriction over photos.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    OwnedBy(i64),
    /// Case-insensitive substring of the description or of any tag name
    Keyword(String),
    /// At least one tag whose name is in the list (exact match)
    AnyTag(Vec<String>),
    MinRating(f64),
    MaxRating(f64),
    CreatedFrom(NaiveDateTime),
    CreatedUntil(NaiveDateTime),
    /// Case-sensitive substring of the description
    DescriptionContains(String),
    TaggedWith(String),
    /// Same calendar day as the creation timestamp
    CreatedOn(NaiveDate),
}

impl Predicate {
    /// SQLite `lower()` only folds ASCII, so Unicode case-insensitive keyword
    /// matching runs in Rust on the loaded rows instead.
    fn is_sql_evaluable(&self) -> bool {
        !matches!(self, Predicate::Keyword(_))
    }

    fn push_sql(&self, builder: &mut QueryBuilder<'_, Sqlite>) {
        match self {
            Predicate::OwnedBy(user_id) => {
                builder.push("p.user_id = ").push_bind(*user_id);
            }
            Predicate::Keyword(_) => {
                // Evaluated after loading, see `is_sql_evaluable`
                builder.push("1 = 1");
            }
            Predicate::AnyTag(names) => {
                builder.push(TAG_EXISTS).push("t.name IN (");
                let mut separated = builder.separated(", ");
                for name in names {
                    separated.push_bind(name.clone());
                }
                separated.push_unseparated("))");
            }
            Predicate::MinRating(min) => {
                builder.push("p.rating >= ").push_bind(*min);
            }
            Predicate::MaxRating(max) => {
                builder.push("p.rating <= ").push_bind(*max);
            }
            Predicate::CreatedFrom(start) => {
                builder.push("p.created_at >= ").push_bind(*start);
            }
            Predicate::CreatedUntil(end) => {
                builder.push("p.created_at <= ").push_bind(*end);
            }
            Predicate::DescriptionContains(text) => {
                builder
                    .push("instr(p.description, ")
                    .push_bind(text.clone())
                    .push(") > 0");
            }
            Predicate::TaggedWith(name) => {
                builder
                    .push(TAG_EXISTS)
                    .push("t.name = ")
                    .push_bind(name.clone())
                    .push(")");
            }
            Predicate::CreatedOn(day) => {
                builder
                    .push("substr(p.created_at, 1, 10) = ")
                    .push_bind(day.format("%Y-%m-%d").to_string());
            }
        }
    }

    /// Evaluates the predicate against a photo with its tags loaded.
    pub fn matches(&self, photo: &Photo) -> bool {
        match self {
            Predicate::OwnedBy(user_id) => photo.user_id == *user_id,
            Predicate::Keyword(keyword) => {
                let needle = keyword.to_lowercase();
                photo.description.to_lowercase().contains(&needle)
                    || photo
                        .tags
                        .iter()
                        .any(|t| t.name.to_lowercase().contains(&needle))
            }
            Predicate::AnyTag(names) => photo.tags.iter().any(|t| names.contains(&t.name)),
            Predicate::MinRating(min) => photo.rating >= *min,
            Predicate::MaxRating(max) => photo.rating <= *max,
            Predicate::CreatedFrom(start) => photo.created_at >= *start,
            Predicate::CreatedUntil(end) => photo.created_at <= *end,
            Predicate::DescriptionContains(text) => photo.description.contains(text.as_str()),
            Predicate::TaggedWith(name) => photo.has_tag_named(name),
            Predicate::CreatedOn(day) => photo.created_at.date() == *day,
        }
    }
}

type PredicateBuilder = fn(&SearchCriteria) -> Option<Predicate>;

/// Criteria predicates, in the order they are appended to a filter.
const CRITERIA_PREDICATES: [PredicateBuilder; 6] = [
    keyword_predicate,
    tags_predicate,
    min_rating_predicate,
    max_rating_predicate,
    start_date_predicate,
    end_date_predicate,
];

fn keyword_predicate(criteria: &SearchCriteria) -> Option<Predicate> {
    criteria
        .keyword()
        .map(|keyword| Predicate::Keyword(keyword.to_string()))
}

fn tags_predicate(criteria: &SearchCriteria) -> Option<Predicate> {
    criteria
        .tag_names()
        .map(|names| Predicate::AnyTag(names.to_vec()))
}

fn min_rating_predicate(criteria: &SearchCriteria) -> Option<Predicate> {
    criteria.min_rating.map(Predicate::MinRating)
}

fn max_rating_predicate(criteria: &SearchCriteria) -> Option<Predicate> {
    criteria.max_rating.map(Predicate::MaxRating)
}

fn start_date_predicate(criteria: &SearchCriteria) -> Option<Predicate> {
    criteria.start_date.map(Predicate::CreatedFrom)
}

fn end_date_predicate(criteria: &SearchCriteria) -> Option<Predicate> {
    criteria.end_date.map(Predicate::CreatedUntil)
}

/// Ordered conjunction of predicates. An empty filter matches every photo.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PhotoFilter {
    predicates: Vec<Predicate>,
}

impl PhotoFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn and(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    /// Filter for the general search. The owner field is ignored.
    pub fn from_criteria(criteria: &SearchCriteria) -> Self {
        Self::new().and_criteria(criteria)
    }

    /// Filter for the per-user search: owner restriction first, then the criteria.
    pub fn for_owner_search(criteria: &SearchCriteria) -> Self {
        let filter = match criteria.user_id {
            Some(user_id) => Self::new().and(Predicate::OwnedBy(user_id)),
            None => Self::new(),
        };
        filter.and_criteria(criteria)
    }

    /// Filter for the description/tag lookups, narrowed by at most one of the
    /// lookup options.
    pub fn for_lookup(base: Predicate, lookup: &LookupFilter) -> SearchResult<Self> {
        let narrowing = match (lookup.rating_filter, lookup.created_at) {
            (Some(_), Some(_)) => return Err(SearchError::ConflictingFilters),
            (Some(rating), None) => Some(Predicate::MinRating(rating)),
            (None, Some(day)) => Some(Predicate::CreatedOn(day)),
            (None, None) => None,
        };

        let filter = Self::new().and(base);
        Ok(match narrowing {
            Some(predicate) => filter.and(predicate),
            None => filter,
        })
    }

    fn and_criteria(self, criteria: &SearchCriteria) -> Self {
        CRITERIA_PREDICATES
            .iter()
            .filter_map(|build| build(criteria))
            .fold(self, |filter, predicate| filter.and(predicate))
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn matches(&self, photo: &Photo) -> bool {
        self.predicates.iter().all(|p| p.matches(photo))
    }

    fn to_query(&self) -> QueryBuilder<'static, Sqlite> {
        let mut builder =
            QueryBuilder::<Sqlite>::new(format!("SELECT {PHOTO_COLUMNS} FROM photos p WHERE 1 = 1"));
        for predicate in self.predicates.iter().filter(|p| p.is_sql_evaluable()) {
            builder.push(" AND ");
            predicate.push_sql(&mut builder);
        }
        builder.push(" ORDER BY p.id ASC");
        builder
    }

    /// Runs the filter and returns every match, ordered by id, with tags loaded.
    pub async fn fetch(&self, pool: &DbPool) -> Result<Vec<Photo>, sqlx::Error> {
        let mut builder = self.to_query();
        let mut photos: Vec<Photo> = builder.build_query_as().fetch_all(pool).await?;
        Photo::load_tags(pool, &mut photos).await?;

        let remaining: Vec<&Predicate> = self
            .predicates
            .iter()
            .filter(|p| !p.is_sql_evaluable())
            .collect();
        if !remaining.is_empty() {
            photos.retain(|photo| remaining.iter().all(|p| p.matches(photo)));
        }
        Ok(photos)
    }
}

pub async fn search_photos(pool: &DbPool, criteria: &SearchCriteria) -> SearchResult<Vec<Photo>> {
    let filter = PhotoFilter::from_criteria(criteria);
    debug!("Photo search with {} predicate(s)", filter.predicates().len());
    Ok(filter.fetch(pool).await?)
}

pub async fn search_photos_by_user(
    pool: &DbPool,
    criteria: &SearchCriteria,
) -> SearchResult<Vec<Photo>> {
    let filter = PhotoFilter::for_owner_search(criteria);
    debug!(
        "Photo search for owner {:?} with {} predicate(s)",
        criteria.user_id,
        filter.predicates().len()
    );
    Ok(filter.fetch(pool).await?)
}

/// Photos whose description contains `description`, optionally narrowed.
///
/// Fails with [`SearchError::DescriptionNotFound`] when no photo description
/// contains the text at all, as opposed to an empty list when the narrowing
/// removes every match.
pub async fn find_by_description(
    pool: &DbPool,
    description: &str,
    lookup: &LookupFilter,
) -> SearchResult<Vec<Photo>> {
    let filter = PhotoFilter::for_lookup(
        Predicate::DescriptionContains(description.to_string()),
        lookup,
    )?;

    if !Photo::description_exists(pool, description).await? {
        return Err(SearchError::DescriptionNotFound);
    }
    Ok(filter.fetch(pool).await?)
}

/// Photos tagged `tag_name`, optionally narrowed. Unknown tags are an error.
pub async fn find_by_tag_name(
    pool: &DbPool,
    tag_name: &str,
    lookup: &LookupFilter,
) -> SearchResult<Vec<Photo>> {
    let filter = PhotoFilter::for_lookup(Predicate::TaggedWith(tag_name.to_string()), lookup)?;

    if !Tag::exists(pool, tag_name).await? {
        return Err(SearchError::TagNotFound);
    }
    Ok(filter.fetch(pool).await?)
}
