pub mod health;
pub mod library;
pub mod progress;
pub mod session;
pub mod settings;
pub mod sync;
