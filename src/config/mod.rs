pub mod profiles;
pub mod runtime;
pub mod settings;

pub use profiles::*;
pub use runtime::*;
pub use settings::*;
