pub mod client;
pub mod error;
pub mod types;

pub use client::{API_URL, LlmClient, MessageSender};
pub use error::LlmError;
pub use types::{
    ContentBlock, Message, MessagesRequest, MessagesResponse, Usage, extract_json_object,
};
