pub mod queries;
pub mod schema;

pub use queries::{Database, PetListing};
