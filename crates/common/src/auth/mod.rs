//! Request authentication shared by the gateway and every service.
//!
//! The same [`VerificationChain`] machinery backs both enforcement points:
//! the gateway composes a chain that trusts the token's claims, each service
//! composes one that also resolves the subject against its own directory.
//! Authorization is a separate [`AccessPolicy`] applied after verification.

mod chain;
mod context;
mod directory;
mod extract;
mod local;
mod policy;
mod public_paths;
mod request;
mod stages;

pub use chain::{Exchange, Rejection, StageOutcome, Verdict, VerificationChain, VerificationStage};
pub use context::AuthContext;
pub use directory::{ClaimsDirectory, DirectoryError, SubjectDirectory};
pub use extract::Authenticated;
pub use local::verify_locally;
pub use policy::{enforce_access_policy, AccessPolicy, PathPattern, Requirement};
pub use public_paths::PublicPaths;
pub use request::RequestHead;
pub use stages::{
    BearerAuthentication, ContextResolution, PublicPathBypass, SubjectConsistency,
    TokenRequirement,
};
