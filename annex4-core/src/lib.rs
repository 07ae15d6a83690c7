pub mod errors;
pub mod section;
pub mod traits;
pub mod types;
pub mod utils;

pub use errors::*;
pub use traits::*;
pub use types::*;
pub use utils::*;