//! User accounts and authentication for gatehouse.
//!
//! This crate provides:
//! - The `User` account type, roles, and server-side sessions
//! - `AuthConfig`, the set of enabled authentication capabilities
//! - Storage traits (`UserStore`, `SessionStore`)
//! - `Accounts`, the operations over those stores: provider sign-in
//!   (`find_for_oauth`), registration, password sign-in, tracking,
//!   remember-me, and password recovery
//!
//! Accounts are created without roles. Whoever creates an account (the
//! provider callback, the sign-up form) calls
//! [`Accounts::ensure_default_role`] afterwards.

mod accounts;
pub mod authentication;
pub mod config;
pub mod error;
#[cfg(any(test, feature = "test-support"))]
pub mod memory;
pub mod oauth;
pub mod password;
pub mod provider;
pub mod recovery;
pub mod registration;
pub mod role;
pub mod session;
pub mod store;
pub mod token;
pub mod user;
pub mod validation;

// Re-export main types at crate root
pub use accounts::Accounts;
pub use config::{AuthConfig, InvalidSetting};
pub use error::{AccountError, FieldError, StoreError, ValidationErrors};
pub use oauth::GENERATED_PASSWORD_LENGTH;
pub use provider::{OAuthPayload, Provider, ProviderInfo, UnknownProvider};
pub use registration::{AccountUpdate, Registration};
pub use role::{Role, RoleSet};
pub use session::{Session, SessionId};
pub use store::{Inserted, SessionStore, UserStore};
pub use user::{PasswordReset, SignInTracking, User};
