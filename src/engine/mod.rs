pub mod evaluation;
pub mod results;

pub use evaluation::*;
pub use results::*;
