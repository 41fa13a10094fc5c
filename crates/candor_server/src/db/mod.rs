mod repo;
mod schema;

pub use repo::{BoardRepo, Confession, NewConfession, Tag};
pub use schema::init_database;
