/*!
 * # Authentication primitives
 *
 * Building blocks for the backends that own their own accounts (the
 * in-process mock and the self-hosted database backend):
 *
 * - Argon2id password hashing and verification
 * - HS256 access tokens with an in-memory revocation list
 *
 * The hosted backend delegates all of this to the remote auth service.
 */

pub mod password;
pub mod tokens;

pub use password::{hash_password, verify_password};
pub use tokens::{Claims, TokenConfig, TokenService};
