pub(crate) mod chat;

pub use chat::{Generate, GenerateOptions, GenerationClient};
