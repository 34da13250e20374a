pub mod blobs;
pub mod cache;
pub mod classifier;
pub mod dependency;
pub mod extraction;
pub mod intent;
pub mod language;
pub mod llm;
pub mod qr;
pub mod rag;
pub mod transcription;
