pub mod profiles;

pub use profiles::{InMemoryProfileStore, PgProfileStore, ProfileStore, PROFILE_CONSTRAINTS};
