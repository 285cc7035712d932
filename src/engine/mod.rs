pub mod backtest;
pub mod controller;

pub use backtest::*;
pub use controller::*;
