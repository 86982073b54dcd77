pub mod audit_event;
pub mod password_reset_token;
pub mod user;

pub use audit_event::ActivityLogEntry;
pub use password_reset_token::{PasswordResetToken, TokenState};
pub use user::{Role, User, UserStatus};
