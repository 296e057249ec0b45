pub mod chat_handlers;
pub mod health;
pub mod model_handlers;
pub mod static_handlers;
