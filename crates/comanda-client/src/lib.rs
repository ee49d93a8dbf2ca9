pub mod llm;
pub mod whatsapp;

pub use llm::OpenAiResponder;
pub use whatsapp::HttpGateway;
