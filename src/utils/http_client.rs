use reqwest::Client;
use std::time::Duration;

pub fn new_api_client() -> Client {
    Client::builder()
        .timeout(Duration::from_secs(600)) // long-running streaming completions
        .connect_timeout(Duration::from_secs(30))
        .pool_idle_timeout(Some(Duration::from_secs(240)))
        .tcp_keepalive(Duration::from_secs(60))
        .build()
        .expect("Failed to build HTTP client")
}
