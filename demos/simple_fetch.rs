//! Fetch a page twice over one keep-alive connection.
//!
//! Run with `RUST_LOG=fetchnet=debug` to watch the connection being reused.

use fetchnet::{FetchOptions, Fetcher, UserAgent};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let fetcher = Fetcher::builder()
        .host("httpbin.org")
        .scheme("https")
        .user_agent(UserAgent::opera("blink"))
        .build()?;

    let resp = fetcher
        .fetch("/get", FetchOptions::new().query_pairs([("q", "fetchnet")]))
        .await?;
    println!("Status: {} {}", resp.status().as_u16(), resp.reason());
    println!("Charset: {}", resp.charset());
    println!("{}", resp.text());

    let json = fetcher.get("/gzip").await?.json()?;
    println!("gzipped: {}", json["gzipped"]);
    println!("Idle connections: {}", fetcher.pool().idle_socket_count());

    Ok(())
}
