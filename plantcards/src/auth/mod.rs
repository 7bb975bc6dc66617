//! Authentication and authorization.
//!
//! # Authentication Methods
//!
//! ## Native login
//!
//! Users register and log in via `/authentication/register` and `/authentication/login` with an
//! email and password. Passwords are hashed with Argon2id. A successful login returns a signed
//! JWT in an HTTP-only cookie.
//!
//! ## OAuth
//!
//! Any number of OAuth2 providers can be configured. The callback finds or creates the account
//! by email and sets the same session cookie as a native login.
//!
//! Non-browser clients may send the session token as `Authorization: Bearer <jwt>` instead of
//! the cookie.
//!
//! # Authorization
//!
//! There are two kinds of user: admins and everyone else. Ownership decides the rest; see
//! [`permissions`].
//!
//! # Modules
//!
//! - [`current_user`]: Extractors for getting the authenticated user in handlers
//! - [`oauth`]: OAuth2 authorization-code flow
//! - [`password`]: Password hashing and verification using Argon2
//! - [`permissions`]: Who may see and change what
//! - [`session`]: Session tokens and cookies
//!
//! # Usage in Handlers
//!
//! ```ignore
//! use plantcards::api::models::users::CurrentUser;
//! use plantcards::auth::permissions;
//!
//! async fn admin_only(current_user: CurrentUser) -> Result<String, Error> {
//!     permissions::require_admin(&current_user)?;
//!     Ok(format!("Hello, {}!", current_user.email))
//! }
//!
//! async fn public(current_user: Option<CurrentUser>) -> String {
//!     match current_user {
//!         Some(user) => format!("Hello, {}!", user.email),
//!         None => "Hello, visitor!".to_string(),
//!     }
//! }
//! ```

pub mod current_user;
pub mod oauth;
pub mod password;
pub mod permissions;
pub mod session;
