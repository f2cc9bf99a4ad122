mod session;
mod user;

pub use session::{AuthResponse, RefreshRequest, RefreshSession};
pub use user::{ChangePasswordRequest, LoginRequest, RegisterRequest, User, UserDto};
