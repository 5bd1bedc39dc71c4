use crate::entities;
use crate::errors::ReelError;
use crate::settings::Database as DbCfg;
use chrono::Utc;
use migration::{Migrator, MigratorTrait};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Database, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, Set, SqlErr,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub phone: Option<String>,
    pub profile_picture: Option<String>,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Favorite {
    pub id: i32,
    pub user_id: i32,
    pub movie_id: i32,
    pub title: String,
    pub created_at: i64,
}

/// Fields the profile update route may overwrite. `None` leaves the stored
/// value alone.
#[derive(Debug, Clone, Default)]
pub struct ProfileChanges {
    pub username: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

pub async fn init(cfg: &DbCfg) -> Result<DatabaseConnection, ReelError> {
    let db = Database::connect(&cfg.url).await?;
    Migrator::up(&db, None).await?;
    Ok(db)
}

fn user_from_model(model: entities::user::Model) -> User {
    User {
        id: model.id,
        username: model.username,
        email: model.email,
        phone: model.phone,
        profile_picture: model.profile_picture,
        created_at: model.created_at,
    }
}

fn favorite_from_model(model: entities::favorite::Model) -> Favorite {
    Favorite {
        id: model.id,
        user_id: model.user_id,
        movie_id: model.movie_id,
        title: model.title,
        created_at: model.created_at,
    }
}

fn unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

/// True when `err` is a uniqueness conflict rather than a genuine failure.
pub fn is_unique_violation(err: &ReelError) -> bool {
    matches!(err, ReelError::Db(db_err) if unique_violation(db_err))
}

// User operations

pub async fn create_user(
    db: &DatabaseConnection,
    username: &str,
    email: &str,
    phone: Option<String>,
) -> Result<User, ReelError> {
    let created_at = Utc::now().timestamp();

    let user = entities::user::ActiveModel {
        id: Default::default(),
        username: Set(username.to_string()),
        email: Set(email.to_string()),
        phone: Set(phone),
        profile_picture: Set(None),
        created_at: Set(created_at),
    };

    let model = user.insert(db).await?;
    Ok(user_from_model(model))
}

pub async fn get_user_by_email(
    db: &DatabaseConnection,
    email: &str,
) -> Result<Option<User>, ReelError> {
    use entities::user::{Column, Entity};

    let user = Entity::find()
        .filter(Column::Email.eq(email))
        .one(db)
        .await?;

    Ok(user.map(user_from_model))
}

pub async fn get_user_by_id(db: &DatabaseConnection, id: i32) -> Result<Option<User>, ReelError> {
    let user = entities::user::Entity::find_by_id(id).one(db).await?;
    Ok(user.map(user_from_model))
}

/// Applies the supplied changes in place. Returns `None` when the user row no
/// longer exists. Uniqueness against other users is NOT re-checked here; a
/// conflicting write surfaces as a database error.
pub async fn update_profile(
    db: &DatabaseConnection,
    id: i32,
    changes: ProfileChanges,
) -> Result<Option<User>, ReelError> {
    let user = match entities::user::Entity::find_by_id(id).one(db).await? {
        Some(u) => u,
        None => return Ok(None),
    };

    let mut active: entities::user::ActiveModel = user.into();
    if let Some(username) = changes.username {
        active.username = Set(username);
    }
    if let Some(email) = changes.email {
        active.email = Set(email);
    }
    if let Some(phone) = changes.phone {
        active.phone = Set(Some(phone));
    }

    let model = active.update(db).await?;
    Ok(Some(user_from_model(model)))
}

pub async fn set_profile_picture(
    db: &DatabaseConnection,
    id: i32,
    url: &str,
) -> Result<(), ReelError> {
    if let Some(user) = entities::user::Entity::find_by_id(id).one(db).await? {
        let mut active: entities::user::ActiveModel = user.into();
        active.profile_picture = Set(Some(url.to_string()));
        active.update(db).await?;
    }
    Ok(())
}

// Favorite operations

/// Inserts a favorite. Returns `false` when the (user, movie) pair already
/// exists: the unique index turns a concurrent double-add into a conflict
/// here instead of a duplicate row.
pub async fn add_favorite(
    db: &DatabaseConnection,
    user_id: i32,
    movie_id: i32,
    title: &str,
) -> Result<bool, ReelError> {
    let favorite = entities::favorite::ActiveModel {
        id: Default::default(),
        user_id: Set(user_id),
        movie_id: Set(movie_id),
        title: Set(title.to_string()),
        created_at: Set(Utc::now().timestamp()),
    };

    match favorite.insert(db).await {
        Ok(_) => Ok(true),
        Err(err) if unique_violation(&err) => Ok(false),
        Err(err) => Err(err.into()),
    }
}

/// Deletes the caller's favorite for `movie_id`. Returns whether a row was
/// actually removed.
pub async fn remove_favorite(
    db: &DatabaseConnection,
    user_id: i32,
    movie_id: i32,
) -> Result<bool, ReelError> {
    use entities::favorite::{Column, Entity};

    let result = Entity::delete_many()
        .filter(Column::UserId.eq(user_id))
        .filter(Column::MovieId.eq(movie_id))
        .exec(db)
        .await?;

    Ok(result.rows_affected > 0)
}

pub async fn is_favorite(
    db: &DatabaseConnection,
    user_id: i32,
    movie_id: i32,
) -> Result<bool, ReelError> {
    use entities::favorite::{Column, Entity};

    let existing = Entity::find()
        .filter(Column::UserId.eq(user_id))
        .filter(Column::MovieId.eq(movie_id))
        .one(db)
        .await?;

    Ok(existing.is_some())
}

/// All favorites owned by `user_id`, oldest first.
pub async fn list_favorites(
    db: &DatabaseConnection,
    user_id: i32,
) -> Result<Vec<Favorite>, ReelError> {
    use entities::favorite::{Column, Entity};

    let rows = Entity::find()
        .filter(Column::UserId.eq(user_id))
        .order_by_asc(Column::Id)
        .all(db)
        .await?;

    Ok(rows.into_iter().map(favorite_from_model).collect())
}
