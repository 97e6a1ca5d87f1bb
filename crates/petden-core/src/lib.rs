pub mod auth;
pub mod clock;
pub mod config;
pub mod data;
pub mod db;
pub mod engine;
pub mod error;
pub mod models;
pub mod service;

pub use auth::Authenticator;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use data::{CatalogEntry, PetCatalog};
pub use db::{Database, PetListing};
pub use engine::{Action, PetState, StatsView};
pub use error::{Fault, PetError, Result};
pub use service::{InteractionView, LoginToken, PetService, PetStatsView};
