pub mod gemini_llm;
pub mod notion;
pub mod openai_llm;
pub mod session_store;

pub use gemini_llm::GeminiGenerationAdapter;
pub use notion::{NotionPageAdapter, NotionSettings, RetryPolicy};
pub use openai_llm::OpenAiGenerationAdapter;
pub use session_store::InMemorySessionStore;
