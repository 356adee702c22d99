pub mod candle;
pub mod frame;
pub mod indicator;
pub mod series;

pub use candle::*;
pub use frame::*;
pub use indicator::*;
pub use series::*;
