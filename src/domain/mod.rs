pub mod engagement;
pub mod model;
pub mod quality;
pub mod relevance;
pub mod timeparse;
