pub mod relay;
pub mod sse_adapter;
