//! Command-line driver: upload an image, create a sketch job, and
//! follow it to a terminal state.
//!
//! Realtime updates arrive over the WebSocket channel when available;
//! the polling fallback backstops delivery either way, and the cache
//! drops whichever path reports late.

use std::path::Path;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use linework_client::channel::RealtimeChannel;
use linework_client::config::ClientConfig;
use linework_client::rest::{CreateSketchRequest, RestClient};
use linework_client::tracker::JobTracker;
use linework_client::transport::WsConnector;
use linework_client::upload::{UploadClient, UploadStep};
use linework_core::status::JobState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "linework=info,linework_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let path = std::env::args()
        .nth(1)
        .context("usage: linework <image-file>")?;
    let config = ClientConfig::from_env();
    let token = config
        .auth_token
        .clone()
        .context("AUTH_TOKEN must be set")?;

    let rest = RestClient::new(config.api_url.clone()).with_bearer_token(&token);
    let uploads = UploadClient::with_client(rest.http().clone(), config.api_url.clone())
        .with_bearer_token(&token);

    // Upload the source image through the presigned flow.
    let filename = Path::new(&path)
        .file_name()
        .and_then(|name| name.to_str())
        .context("image path has no usable file name")?
        .to_string();
    let content_type = content_type_for(&filename)
        .with_context(|| format!("unsupported image extension: {filename}"))?;
    let bytes = tokio::fs::read(&path)
        .await
        .with_context(|| format!("failed to read {path}"))?;

    let confirmation = uploads
        .upload_file(&filename, content_type, bytes, |step: UploadStep| {
            tracing::info!(percent = step.percent(), ?step, "Upload progress");
        })
        .await?;

    // Track the conversion job.
    let tracker = JobTracker::new(rest);
    let channel = RealtimeChannel::new(
        WsConnector::new(config.ws_url.clone()),
        config.reconnect.clone(),
    );
    let _subscription = tracker.attach(&channel);

    if let Err(e) = channel.connect(&token).await {
        tracing::warn!(error = %e, "Realtime channel unavailable, relying on polling");
    }

    let response = tracker
        .create_sketch(&CreateSketchRequest::new(confirmation.file_info.key))
        .await?;

    let status = tracker
        .poll_until_terminal(&response.task_id, &config.poll, &CancellationToken::new())
        .await?;

    channel.disconnect().await;

    match JobState::from(status.status) {
        JobState::Completed => {
            tracing::info!(sketch_id = response.sketch_id, "Sketch ready");
            if let Ok(sketch) = tracker.sketch(response.sketch_id).await {
                println!("{}", sketch.sketch_image_url);
            }
            Ok(())
        }
        state => anyhow::bail!(
            "sketch job ended in {state:?}: {}",
            status.error.unwrap_or_else(|| "no error reported".to_string())
        ),
    }
}

/// Map a file extension to the content type the API accepts.
fn content_type_for(filename: &str) -> Option<&'static str> {
    let extension = Path::new(filename).extension()?.to_str()?;
    match extension.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        _ => None,
    }
}
