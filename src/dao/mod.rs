/// Shared game document stores.
pub mod game_store;
/// Document model definitions.
pub mod models;
/// Local cache of share codes.
pub mod share_cache;
/// Storage abstraction layer for database operations.
pub mod storage;
