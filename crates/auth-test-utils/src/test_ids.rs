//! Fixed test identities for deterministic tests
//!
//! All identities are constants so that failures reproduce exactly.

// Fixed instant the harness clock starts at (2023-11-14T22:13:20Z)
pub const TEST_NOW: i64 = 1_700_000_000;

// Users
pub const TEST_USER_ALICE: &str = "alice";
pub const TEST_USER_BOB: &str = "bob";
pub const TEST_USER_CAROL: &str = "carol";

// Passwords (plaintext, test only)
pub const TEST_PASSWORD_ALICE: &str = "alice-password";
pub const TEST_PASSWORD_BOB: &str = "bob-password";
pub const TEST_PASSWORD_CAROL: &str = "carol-password";

// Roles
pub const ROLE_TEACHER: &str = "TEACHER";
pub const ROLE_USER: &str = "USER";
pub const ROLE_ADMIN: &str = "ADMIN";

// Signing key IDs
pub const TEST_KEY_ID_1: &str = "test-key-2025-01";
pub const TEST_KEY_ID_2: &str = "test-key-2025-02";

/// Username, password and roles of every user the harness seeds.
///
/// - alice: TEACHER
/// - bob: USER
/// - carol: ADMIN, USER
pub const TEST_USERS: &[(&str, &str, &[&str])] = &[
    (TEST_USER_ALICE, TEST_PASSWORD_ALICE, &[ROLE_TEACHER]),
    (TEST_USER_BOB, TEST_PASSWORD_BOB, &[ROLE_USER]),
    (TEST_USER_CAROL, TEST_PASSWORD_CAROL, &[ROLE_ADMIN, ROLE_USER]),
];
