pub mod server;
pub mod api;
pub mod error;
pub mod state;

pub use server::*;
pub use error::*;
pub use state::*;
