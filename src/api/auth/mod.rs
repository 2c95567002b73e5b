pub mod types;
pub mod login;
pub mod register;
pub mod profile;

pub use login::*;
pub use register::*;
pub use profile::*;
