pub mod assets;
pub mod chat;
pub mod dependencies;
pub mod documents;
pub mod extract;
pub mod health;
pub mod transcribe;
pub mod work_orders;
