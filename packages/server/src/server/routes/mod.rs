// HTTP routes
pub mod health;
pub mod pair;

pub use health::*;
pub use pair::*;
