use crate::entities::file_infos::FileStatus;
use crate::entities::{chunk_infos, file_infos, prelude::*};
use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::Set;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, IntoActiveModel,
    PaginatorTrait, QueryFilter, QueryOrder,
};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct NewFileRecord {
    pub file_name: String,
    pub file_path: String,
    pub file_size: i64,
    pub file_hash: String,
    pub content_type: String,
}

#[derive(Debug, Clone)]
pub struct NewChunkRecord {
    pub file_id: String,
    pub chunk_num: i32,
    pub chunk_size: i64,
    pub chunk_path: String,
}

/// Durable FileRecord / ChunkRecord storage on top of sea-orm.
#[derive(Clone)]
pub struct RecordStore {
    db: DatabaseConnection,
}

impl RecordStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    pub async fn ping(&self) -> Result<(), DbErr> {
        self.db.ping().await
    }

    pub async fn create_file_record(&self, new: NewFileRecord) -> Result<file_infos::Model, DbErr> {
        let now = Utc::now();
        file_infos::ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            file_name: Set(new.file_name),
            file_path: Set(new.file_path),
            file_size: Set(new.file_size),
            file_hash: Set(new.file_hash),
            content_type: Set(new.content_type),
            status: Set(FileStatus::Uploading),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&self.db)
        .await
    }

    pub async fn get_file_record_by_id(&self, id: &str) -> Result<Option<file_infos::Model>, DbErr> {
        FileInfos::find_by_id(id).one(&self.db).await
    }

    /// Oldest record carrying `hash`, optionally restricted to one status.
    pub async fn get_file_record_by_hash(
        &self,
        hash: &str,
        status: Option<FileStatus>,
    ) -> Result<Option<file_infos::Model>, DbErr> {
        let mut query = FileInfos::find().filter(file_infos::Column::FileHash.eq(hash));
        if let Some(status) = status {
            query = query.filter(file_infos::Column::Status.eq(status));
        }
        query
            .order_by_asc(file_infos::Column::CreatedAt)
            .one(&self.db)
            .await
    }

    /// Persists every field of `record` and refreshes `updated_at`.
    pub async fn update_file_record(
        &self,
        record: file_infos::Model,
    ) -> Result<file_infos::Model, DbErr> {
        let mut active = record.into_active_model().reset_all();
        active.updated_at = Set(Utc::now());
        active.update(&self.db).await
    }

    pub async fn touch_file_record(&self, id: &str) -> Result<(), DbErr> {
        FileInfos::update_many()
            .col_expr(file_infos::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(file_infos::Column::Id.eq(id))
            .exec(&self.db)
            .await?;
        Ok(())
    }

    pub async fn delete_file_record(&self, id: &str) -> Result<(), DbErr> {
        FileInfos::delete_by_id(id).exec(&self.db).await?;
        Ok(())
    }

    pub async fn list_file_records(
        &self,
        status: Option<FileStatus>,
    ) -> Result<Vec<file_infos::Model>, DbErr> {
        let mut query = FileInfos::find();
        if let Some(status) = status {
            query = query.filter(file_infos::Column::Status.eq(status));
        }
        query.all(&self.db).await
    }

    /// Uploads still `uploading` whose last mutation is older than `cutoff`.
    pub async fn list_expired_uploads(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<file_infos::Model>, DbErr> {
        FileInfos::find()
            .filter(file_infos::Column::Status.eq(FileStatus::Uploading))
            .filter(file_infos::Column::UpdatedAt.lt(cutoff))
            .all(&self.db)
            .await
    }

    /// Completed records other than `excluding_id` whose bytes live at `path`.
    pub async fn count_completed_by_path(
        &self,
        path: &str,
        excluding_id: &str,
    ) -> Result<u64, DbErr> {
        FileInfos::find()
            .filter(file_infos::Column::FilePath.eq(path))
            .filter(file_infos::Column::Status.eq(FileStatus::Completed))
            .filter(file_infos::Column::Id.ne(excluding_id))
            .count(&self.db)
            .await
    }

    pub async fn create_chunk_record(
        &self,
        new: NewChunkRecord,
    ) -> Result<chunk_infos::Model, DbErr> {
        let now = Utc::now();
        chunk_infos::ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            file_id: Set(new.file_id),
            chunk_num: Set(new.chunk_num),
            chunk_size: Set(new.chunk_size),
            chunk_path: Set(new.chunk_path),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&self.db)
        .await
    }

    pub async fn get_chunk_record(
        &self,
        file_id: &str,
        chunk_num: i32,
    ) -> Result<Option<chunk_infos::Model>, DbErr> {
        ChunkInfos::find()
            .filter(chunk_infos::Column::FileId.eq(file_id))
            .filter(chunk_infos::Column::ChunkNum.eq(chunk_num))
            .one(&self.db)
            .await
    }

    pub async fn update_chunk_record(
        &self,
        record: chunk_infos::Model,
    ) -> Result<chunk_infos::Model, DbErr> {
        let mut active = record.into_active_model().reset_all();
        active.updated_at = Set(Utc::now());
        active.update(&self.db).await
    }

    pub async fn list_chunk_records(&self, file_id: &str) -> Result<Vec<chunk_infos::Model>, DbErr> {
        ChunkInfos::find()
            .filter(chunk_infos::Column::FileId.eq(file_id))
            .order_by_asc(chunk_infos::Column::ChunkNum)
            .all(&self.db)
            .await
    }

    pub async fn delete_chunk_records(&self, file_id: &str) -> Result<u64, DbErr> {
        let res = ChunkInfos::delete_many()
            .filter(chunk_infos::Column::FileId.eq(file_id))
            .exec(&self.db)
            .await?;
        Ok(res.rows_affected)
    }
}
