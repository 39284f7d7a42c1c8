pub mod agent;
pub mod dataframe;
pub mod llm_agent;
