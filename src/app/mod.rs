pub mod context;
pub mod fetcher;
pub mod orchestrator;
pub mod retry;
