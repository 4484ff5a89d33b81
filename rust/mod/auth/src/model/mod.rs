mod login_log;
mod policy;
mod role;
mod secure_token;
mod sso;
mod token;
mod user;

pub use login_log::*;
pub use policy::*;
pub use role::*;
pub use secure_token::*;
pub use sso::*;
pub use token::*;
pub use user::*;
