pub mod achievements;
pub mod addition_pruner;
pub mod collection;
pub mod config;
pub mod database_validator;
pub mod friends;
pub mod local_store;
pub mod sharing;
pub mod sqlite_store;
pub mod storage;
pub mod thegamesdb;
pub mod trending;
