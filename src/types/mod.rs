pub mod domain;
pub mod extraction;
pub mod gemini;
