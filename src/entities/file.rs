use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Deserialize, Serialize)]
#[sea_orm(table_name = "files")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub app: String,
    pub tenant_id: Option<String>,
    pub owner_id: Option<String>,
    pub visibility: Visibility,
    pub bucket: String,
    pub object_key: String,
    pub original_name: String,
    pub mime_type: String,
    pub size: i64,
    pub created_at: DateTime,
}

/// Access policy of a stored file. Decides the key prefix at upload time and
/// how download links are issued afterwards.
#[derive(
    EnumIter,
    DeriveActiveEnum,
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Deserialize,
    Serialize,
    utoipa::ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Served straight from the public base URL.
    #[sea_orm(string_value = "public")]
    Public,
    /// Only reachable through a presigned URL.
    #[default]
    #[sea_orm(string_value = "private")]
    Private,
}

impl Visibility {
    /// Leading path segment of every object key with this visibility.
    pub fn key_prefix(self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
