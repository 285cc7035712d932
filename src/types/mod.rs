pub mod trading;
pub mod candle;
pub mod account;

pub use trading::*;
pub use candle::*;
pub use account::*;
