pub mod context;
pub mod llm;
