pub mod prelude;

pub mod chunk_infos;
pub mod file_infos;
