pub mod contact;
pub mod pet;
pub mod user;

pub use contact::{ContactMessage, NewContact};
pub use pet::{Pet, PetKind, Stats, STAT_MAX, STAT_MIN};
pub use user::{normalize_email, User, UserProfile};
