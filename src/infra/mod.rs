pub mod config;
pub mod database;
pub mod logging;
pub mod postgres_repo;
pub mod random;
pub mod sql;
pub mod sqlite_repo;
pub mod system_clock;
pub mod time;
pub mod webdriver;
