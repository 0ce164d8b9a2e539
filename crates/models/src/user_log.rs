use std::fmt;
use std::str::FromStr;

use chrono::Utc;
use sea_orm::{entity::prelude::*, DatabaseConnection, QueryFilter, QueryOrder, QuerySelect, Set};
use serde::{Deserialize, Serialize};

use crate::errors::ModelError;
use crate::user_profile;

/// Activity log entries shown to a user, appended by background tasks.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user_log")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub profile_id: String,
    pub time: DateTimeWithTimeZone,
    pub level: String,
    #[sea_orm(column_type = "Text")]
    pub message: String,
}

#[derive(Copy, Clone, Debug, EnumIter)]
pub enum Relation {
    Profile,
}

impl RelationTrait for Relation {
    fn def(&self) -> RelationDef {
        match self {
            Relation::Profile => Entity::belongs_to(user_profile::Entity)
                .from(Column::ProfileId)
                .to(user_profile::Column::Id)
                .into(),
        }
    }
}

impl Related<user_profile::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Profile.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
    Success,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
            LogLevel::Fatal => "FATAL",
            LogLevel::Success => "SUCCESS",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DEBUG" => Ok(LogLevel::Debug),
            "INFO" => Ok(LogLevel::Info),
            "WARN" => Ok(LogLevel::Warn),
            "ERROR" => Ok(LogLevel::Error),
            "FATAL" => Ok(LogLevel::Fatal),
            "SUCCESS" => Ok(LogLevel::Success),
            other => Err(ModelError::Validation(format!("unknown log level {other}"))),
        }
    }
}

pub async fn append(db: &DatabaseConnection, profile_id: &str, level: LogLevel, message: &str) -> Result<Model, ModelError> {
    if message.trim().is_empty() {
        return Err(ModelError::Validation("log message required".into()));
    }
    let am = ActiveModel {
        profile_id: Set(profile_id.to_string()),
        time: Set(Utc::now().into()),
        level: Set(level.as_str().to_string()),
        message: Set(message.to_string()),
        ..Default::default()
    };
    Ok(am.insert(db).await?)
}

/// Newest entries first.
pub async fn recent(db: &DatabaseConnection, profile_id: &str, limit: u64) -> Result<Vec<Model>, ModelError> {
    Ok(Entity::find()
        .filter(Column::ProfileId.eq(profile_id))
        .order_by_desc(Column::Id)
        .limit(limit)
        .all(db)
        .await?)
}
