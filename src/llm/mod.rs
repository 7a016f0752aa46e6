pub mod backend;
pub mod client;
pub mod embeddings;
pub mod json;
pub mod prompts;
pub mod resilient;
#[cfg(test)]
pub mod scripted;
pub mod validation;

pub use backend::*;
pub use client::*;
pub use embeddings::*;
pub use json::*;
pub use prompts::*;
pub use resilient::*;
pub use validation::*;
