//! Stream one reply from a running blog backend.
//!
//! Configure with the `QUILL_*` variables (see `ClientConfig::from_env`) and run:
//!   cargo run --example stream_chat -p quill-client -- "What is new on the blog?"

use std::io::Write;

use futures::StreamExt;
use quill_client::{ChatClient, ChatRequest, ChatTransport, ClientConfig, StreamEvent};
use quill_types::ConversationId;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let message = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "Hello from quill".to_string());

    let client = ChatClient::from_config(ClientConfig::from_env()?);
    let conversation = ConversationId::generate();

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_ctrl_c.cancel();
        }
    });

    let mut stream = client
        .open_stream(ChatRequest::new(message, conversation), cancel)
        .await?;

    while let Some(event) = stream.receiver.next().await {
        match event {
            StreamEvent::TextDelta(text) => {
                print!("{text}");
                std::io::stdout().flush()?;
            }
            StreamEvent::Done => println!(),
            StreamEvent::Error(err) => eprintln!("\nstream error: {err}"),
        }
    }

    Ok(())
}
