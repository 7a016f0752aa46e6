pub mod extraction;
pub mod record;
pub mod scoring;
pub mod token;
pub mod turn;

pub use extraction::*;
pub use record::*;
pub use scoring::*;
pub use token::*;
pub use turn::*;
