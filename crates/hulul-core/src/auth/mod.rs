//! Authentication domain module.
//!
//! - `model`: session, user and state records
//! - `gateway`: the identity provider interface
//! - `storage`: persistence of the session store's state

mod gateway;
mod model;
mod storage;

pub use gateway::{AccessTokenSource, AuthGateway};
pub use model::{
    ADMIN_ROLE_CLAIM, AuthSession, AuthState, AuthUser, PERSISTED_AUTH_STATE_VERSION,
    PersistedAuthState, Role, SignUpMetadata,
};
pub use storage::SessionStorage;
