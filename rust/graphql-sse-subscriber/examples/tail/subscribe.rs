use graphql_sse_subscriber::prelude::*;
use serde_json::json;
use tokio::time::{sleep, Duration};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut args = std::env::args().skip(1);
    let url = args
        .next()
        .unwrap_or_else(|| "http://localhost:4000/graphql".to_string());
    let seconds: u64 = args.next().and_then(|s| s.parse().ok()).unwrap_or(30);

    let config = SubscriberConfig::new(url)
        .with_verbose(true)
        .with_error_policy(ErrorPolicy::Report)
        .with_connect_timeout(Duration::from_secs(10));
    let client = SubscriberClient::new(config)?;

    let request = SubscriptionRequest::new(
        "subscription OnTrade($market: String!) { onTrade(market: $market) { id price size } }",
    )
    .with_variables(&json!({ "market": "SOL-USD" }))?;

    let mut sub = client.graphql(request);
    sub.subscribe(
        Callbacks::new()
            .on_next(|data| println!("trade: {}", data))
            .on_error(|payload| match GraphQLErrors::from_value(&payload) {
                Some(errors) => {
                    for message in errors.messages() {
                        eprintln!("error: {}", message);
                    }
                }
                None => eprintln!("error: {}", payload),
            }),
    )?;

    println!("Subscribed to {}", sub.url()?);
    sleep(Duration::from_secs(seconds)).await;

    sub.shutdown().await;
    println!("Unsubscribed");
    Ok(())
}
