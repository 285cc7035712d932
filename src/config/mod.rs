pub mod runtime;
pub mod manager;
pub mod settings;

pub use runtime::*;
pub use manager::*;
pub use settings::*;
