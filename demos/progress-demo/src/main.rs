//! Demo server: a static-token verifier and a producer that replays a fake
//! meeting analysis and batch job in a loop.
//!
//! ```text
//! cargo run -p progress-demo
//! websocat 'ws://127.0.0.1:8080/?token=demo-token'
//! {"event":"join-meeting","data":"demo"}
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use pulsewire::prelude::*;
use serde_json::json;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// `token:user` pairs, comma separated.
const ENV_DEMO_TOKENS: &str = "PULSEWIRE_DEMO_TOKENS";

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

/// Maps fixed tokens to users. Development only.
struct StaticTokens {
    users: HashMap<String, String>,
}

impl StaticTokens {
    fn from_env() -> Self {
        let raw = std::env::var(ENV_DEMO_TOKENS)
            .unwrap_or_else(|_| "demo-token:demo-user".to_string());
        let users = raw
            .split(',')
            .filter_map(|pair| pair.split_once(':'))
            .map(|(token, user)| (token.trim().to_string(), user.trim().to_string()))
            .collect();
        Self { users }
    }
}

impl IdentityVerifier for StaticTokens {
    async fn verify(&self, token: &str) -> Result<Identity, VerifyError> {
        self.users
            .get(token)
            .map(|user| Identity::new(user.as_str()))
            .ok_or_else(|| VerifyError::InvalidToken("unknown demo token".into()))
    }
}

// ---------------------------------------------------------------------------
// Fake producer
// ---------------------------------------------------------------------------

async fn replay_jobs(hub: Arc<Hub>) {
    let stages = [
        (10.0, "transcription", "Transcribing audio"),
        (40.0, "moment-detection", "Detecting key moments"),
        (75.0, "scoring", "Scoring talk tracks"),
        (95.0, "summary", "Writing summary"),
    ];

    loop {
        for (step, (progress, stage, message)) in stages.iter().enumerate() {
            let delivered = hub
                .emit_analysis_progress(AnalysisProgress {
                    meeting_id: "demo".into(),
                    analysis_id: "demo-analysis".into(),
                    progress: *progress,
                    stage: (*stage).into(),
                    message: (*message).into(),
                    moments_found: Some(step as u32 * 2),
                })
                .await;

            let completed_items = step as u32 + 1;
            hub.emit_batch_progress(BatchProgress {
                batch_id: "demo".into(),
                progress: f64::from(completed_items) * 25.0,
                stage: "processing".into(),
                message: format!("Processed {completed_items} of 4 meetings"),
                completed_items,
                total_items: 4,
                failed_items: 0,
            })
            .await;

            tracing::debug!(stage, delivered, "demo progress emitted");
            tokio::time::sleep(Duration::from_secs(1)).await;
        }

        hub.emit_analysis_completed(
            "demo",
            "demo-analysis",
            json!({ "momentsFound": 6, "overallScore": 7.5 }),
        )
        .await;
        hub.emit_batch_completed("demo", json!({ "processed": 4, "failed": 0 }))
            .await;
        tokio::time::sleep(Duration::from_secs(3)).await;
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), PulsewireError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env()?;
    let server = PulsewireServer::builder()
        .config(config)
        .build(StaticTokens::from_env(), AllowAll)
        .await?;

    tracing::info!(addr = ?server.local_addr().ok(), "progress demo listening");
    tokio::spawn(replay_jobs(server.hub()));

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        })
        .await
}
