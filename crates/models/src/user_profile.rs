use sea_orm::{entity::prelude::*, ConnectionTrait, DatabaseConnection, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::ModelError;
use crate::user;

pub const DEFAULT_LANG: &str = "en";
pub const DEFAULT_CALENDAR_NAME: &str = "slh autorenew";
pub const DEFAULT_RENEW_DATE: i32 = 3;
/// Days before the due date at which a loan may be renewed.
pub const RENEW_DATE_RANGE: std::ops::RangeInclusive<i32> = 2..=13;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user_profile")]
pub struct Model {
    /// External identity id issued by the OAuth provider.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    #[sea_orm(unique)]
    pub user_id: Option<i32>,
    pub name: String,
    #[serde(skip_serializing)]
    #[sea_orm(column_type = "Text", nullable)]
    pub credential: Option<String>,
    pub lang: String,
    pub renew_enabled: bool,
    pub renew_date: i32,
    pub calendar_name: String,
    #[sea_orm(unique)]
    pub library_login: Option<String>,
    #[serde(skip_serializing)]
    pub library_password: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter)]
pub enum Relation {
    User,
}

impl RelationTrait for Relation {
    fn def(&self) -> RelationDef {
        match self {
            Relation::User => Entity::belongs_to(user::Entity)
                .from(Column::UserId)
                .to(user::Column::Id)
                .into(),
        }
    }
}

impl Related<user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Preference fields edited from the settings page.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    pub lang: String,
    pub renew_enabled: bool,
    pub renew_date: i32,
    pub calendar_name: String,
    /// Library system account used by the renew job.
    pub library_login: Option<String>,
    #[serde(skip_serializing)]
    pub library_password: Option<String>,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            lang: DEFAULT_LANG.to_string(),
            renew_enabled: false,
            renew_date: DEFAULT_RENEW_DATE,
            calendar_name: DEFAULT_CALENDAR_NAME.to_string(),
            library_login: None,
            library_password: None,
        }
    }
}

fn is_blank(v: &Option<String>) -> bool {
    v.as_deref().map(str::trim).unwrap_or("").is_empty()
}

pub fn validate_preferences(p: &Preferences) -> Result<(), ModelError> {
    if p.lang.trim().is_empty() {
        return Err(ModelError::Validation("lang required".into()));
    }
    if !RENEW_DATE_RANGE.contains(&p.renew_date) {
        return Err(ModelError::Validation(format!(
            "renew_date must be within {}..={}",
            RENEW_DATE_RANGE.start(),
            RENEW_DATE_RANGE.end()
        )));
    }
    if p.calendar_name.trim().is_empty() {
        return Err(ModelError::Validation("calendar_name required".into()));
    }
    if p.renew_enabled && (is_blank(&p.library_login) || is_blank(&p.library_password)) {
        return Err(ModelError::Validation("library credentials required while renew is enabled".into()));
    }
    Ok(())
}

/// Fetch the profile for an external id, creating it with `name` when absent.
/// Returns `(profile, created)`.
pub async fn get_or_create(db: &DatabaseConnection, id: &str, name: &str) -> Result<(Model, bool), ModelError> {
    if id.trim().is_empty() {
        return Err(ModelError::Validation("profile id required".into()));
    }
    if let Some(found) = Entity::find_by_id(id.to_string()).one(db).await? {
        return Ok((found, false));
    }
    let defaults = Preferences::default();
    let am = ActiveModel {
        id: Set(id.to_string()),
        user_id: Set(None),
        name: Set(name.to_string()),
        credential: Set(None),
        lang: Set(defaults.lang),
        renew_enabled: Set(defaults.renew_enabled),
        renew_date: Set(defaults.renew_date),
        calendar_name: Set(defaults.calendar_name),
        library_login: Set(None),
        library_password: Set(None),
    };
    match am.insert(db).await.map_err(ModelError::from) {
        Ok(created) => Ok((created, true)),
        // lost an insert race against a concurrent login for the same id
        Err(ModelError::Conflict(_)) => {
            debug!(profile_id = %id, "profile created concurrently, refetching");
            let found = Entity::find_by_id(id.to_string())
                .one(db)
                .await?
                .ok_or_else(|| ModelError::NotFound(format!("profile {id}")))?;
            Ok((found, false))
        }
        Err(e) => Err(e),
    }
}

pub async fn find<C: ConnectionTrait>(db: &C, id: &str) -> Result<Option<Model>, ModelError> {
    Ok(Entity::find_by_id(id.to_string()).one(db).await?)
}

pub async fn find_by_user(db: &DatabaseConnection, user_id: i32) -> Result<Option<Model>, ModelError> {
    Ok(Entity::find().filter(Column::UserId.eq(user_id)).one(db).await?)
}

pub async fn find_by_library_login(db: &DatabaseConnection, login: &str) -> Result<Option<Model>, ModelError> {
    Ok(Entity::find().filter(Column::LibraryLogin.eq(login)).one(db).await?)
}

/// Store name, user link and credential after a login.
pub async fn save_login<C: ConnectionTrait>(
    db: &C,
    id: &str,
    user_id: i32,
    name: &str,
    credential: &str,
) -> Result<Model, ModelError> {
    if credential.trim().is_empty() {
        return Err(ModelError::Validation("credential required".into()));
    }
    let mut am: ActiveModel = find(db, id)
        .await?
        .ok_or_else(|| ModelError::NotFound(format!("profile {id}")))?
        .into();
    am.user_id = Set(Some(user_id));
    am.name = Set(name.to_string());
    am.credential = Set(Some(credential.to_string()));
    Ok(am.update(db).await?)
}

pub async fn update_preferences(db: &DatabaseConnection, id: &str, prefs: &Preferences) -> Result<Model, ModelError> {
    validate_preferences(prefs)?;
    let mut am: ActiveModel = find(db, id)
        .await?
        .ok_or_else(|| ModelError::NotFound(format!("profile {id}")))?
        .into();
    am.lang = Set(prefs.lang.clone());
    am.renew_enabled = Set(prefs.renew_enabled);
    am.renew_date = Set(prefs.renew_date);
    am.calendar_name = Set(prefs.calendar_name.clone());
    am.library_login = Set(prefs.library_login.clone());
    am.library_password = Set(prefs.library_password.clone());
    Ok(am.update(db).await?)
}

/// Profiles the renew job can act for: opted in, with a library login on file.
pub async fn list_renew_enabled(db: &DatabaseConnection) -> Result<Vec<Model>, ModelError> {
    Ok(Entity::find()
        .filter(Column::RenewEnabled.eq(true))
        .filter(Column::LibraryLogin.is_not_null())
        .all(db)
        .await?)
}

impl Model {
    pub fn preferences(&self) -> Preferences {
        Preferences {
            lang: self.lang.clone(),
            renew_enabled: self.renew_enabled,
            renew_date: self.renew_date,
            calendar_name: self.calendar_name.clone(),
            library_login: self.library_login.clone(),
            library_password: self.library_password.clone(),
        }
    }
}
