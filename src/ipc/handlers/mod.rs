pub mod backup;
pub mod core;
pub mod lessons;
pub mod roster;
pub mod setup;
pub mod sheets;
pub mod storage;
