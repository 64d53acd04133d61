#[macro_use]
pub mod macros;

pub mod cost;
pub mod energy;
pub mod percent;
pub mod power;
pub mod rate;
pub mod time;
mod zero;

pub use self::zero::Zero;
