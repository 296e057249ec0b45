pub mod anthropic_client;
pub mod cache_policy;
