pub use super::chunk_infos::Entity as ChunkInfos;
pub use super::file_infos::Entity as FileInfos;
