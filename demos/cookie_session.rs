//! Log in once, keep the session in `demo@httpbin.org.lwp`, and reuse it on
//! the next run.

use fetchnet::{FetchOptions, Fetcher};
use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    let fetcher = Fetcher::builder()
        .host("httpbin.org")
        .scheme("https")
        .persistent_cookies("demo", "httpbin.org")
        .build_blocking()?;

    match fetcher.get_cookie("session") {
        Some(session) => println!("Restored session: {session}"),
        None => {
            println!("--- Step 1: Setting cookie ---");
            let resp = fetcher.fetch(
                "/cookies/set",
                FetchOptions::new().query_pairs([("session", "hello_fetchnet")]),
            )?;
            println!("Landed on {} ({})", resp.url(), resp.status());
        }
    }

    println!("\n--- Step 2: Verifying cookie ---");
    let resp = fetcher.get("/cookies")?;
    println!("{}", resp.text());

    if let Some(path) = fetcher.cookie_jar().path() {
        println!("Jar saved to {}", path.display());
    }
    Ok(())
}
