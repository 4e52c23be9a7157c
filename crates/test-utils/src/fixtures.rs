//! Fixed secrets and environment maps shared by every test.

use std::collections::HashMap;

/// Signing secret every test server is configured with (32+ bytes).
pub const TEST_SECRET: &str = "next-episode-test-signing-secret-0001";

/// A secret no test server knows. Tokens signed with it must be rejected
/// everywhere.
pub const FOREIGN_SECRET: &str = "someone-elses-signing-secret-000000001";

/// Lowest bcrypt cost the auth service accepts, to keep tests fast.
pub const TEST_BCRYPT_COST: &str = "10";

/// Environment for a service bound to a random local port.
pub fn test_vars() -> HashMap<String, String> {
    HashMap::from([
        ("JWT_SECRET".to_string(), TEST_SECRET.to_string()),
        ("BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
        ("BCRYPT_COST".to_string(), TEST_BCRYPT_COST.to_string()),
    ])
}
