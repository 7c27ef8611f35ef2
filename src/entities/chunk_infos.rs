use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "chunk_infos")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub file_id: String,
    pub chunk_num: i32,
    /// Bytes actually written for this chunk.
    pub chunk_size: i64,
    pub chunk_path: String,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::file_infos::Entity",
        from = "Column::FileId",
        to = "super::file_infos::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    FileInfos,
}

impl Related<super::file_infos::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::FileInfos.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
