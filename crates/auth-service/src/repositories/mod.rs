pub mod credentials;

pub use credentials::{
    CredentialStore, InMemoryCredentialStore, PgCredentialStore, CREDENTIAL_CONSTRAINTS,
};
