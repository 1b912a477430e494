pub mod browser;
pub mod clock;
pub mod random;
pub mod store;
