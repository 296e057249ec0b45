pub mod chat;
pub mod stream_event;
