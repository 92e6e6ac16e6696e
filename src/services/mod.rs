pub mod analysis;
pub mod document_reader;
pub mod llm_client;
