//! Seed a device's call history through a running server.
//!
//! Usage: cargo xtask seed <DEVICE_ID> --count 3

use serde_json::{json, Value};
use uuid::Uuid;

use crate::prelude::*;
use crate::Global;

/// Seed command arguments.
#[derive(Debug, clap::Args)]
pub struct SeedCommand {
    /// Device whose history receives the calls.
    pub device_id: String,

    /// Number of calls to create (default: 3).
    #[arg(long, default_value = "3")]
    pub count: u32,

    /// Base URL of the server (default: http://localhost:3000).
    #[arg(long, default_value = "http://localhost:3000")]
    pub base_url: String,
}

const TOPICS: [&str; 4] = ["daily", "business", "travel", "interview"];

const SCRIPT: [(&str, &str); 4] = [
    ("assistant", "Hi! How was your day so far?"),
    ("user", "Um, it was pretty good. I went to the office early."),
    ("assistant", "Nice. What did you work on this morning?"),
    ("user", "I prepared slides for a meeting with a new client."),
];

/// Posts one action to the dispatcher and returns the response body.
async fn post_action(client: &reqwest::Client, base_url: &str, body: Value) -> anyhow::Result<Value> {
    let action = body["action"].as_str().unwrap_or("unknown").to_string();

    let response = client
        .post(base_url)
        .json(&body)
        .send()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to send {action}: {e}"))?;

    let status = response.status();
    let body: Value = response.json().await.unwrap_or(Value::Null);
    if !status.is_success() {
        return Err(anyhow::anyhow!("{action} failed: {status} - {body}"));
    }

    Ok(body)
}

/// Creates one finished call with a short transcript.
async fn seed_call(
    client: &reqwest::Client,
    cmd: &SeedCommand,
    index: usize,
) -> anyhow::Result<String> {
    let session_id = Uuid::new_v4().to_string();
    let device_id = cmd.device_id.as_str();

    post_action(
        client,
        &cmd.base_url,
        json!({
            "action": "startSession",
            "deviceId": device_id,
            "sessionId": session_id,
            "tutorName": "Emma",
            "settings": {
                "topic": TOPICS[index % TOPICS.len()],
                "accent": "us",
                "level": "intermediate",
            },
        }),
    )
    .await?;

    for (turn, (role, content)) in SCRIPT.iter().enumerate() {
        post_action(
            client,
            &cmd.base_url,
            json!({
                "action": "saveMessage",
                "deviceId": device_id,
                "sessionId": session_id,
                "role": role,
                "content": content,
                "turnNumber": turn + 1,
            }),
        )
        .await?;
    }

    let word_count: usize = SCRIPT
        .iter()
        .filter(|(role, _)| *role == "user")
        .map(|(_, content)| content.split_whitespace().count())
        .sum();

    post_action(
        client,
        &cmd.base_url,
        json!({
            "action": "endSession",
            "deviceId": device_id,
            "sessionId": session_id,
            "duration": 60 + index * 30,
            "turnCount": SCRIPT.len(),
            "wordCount": word_count,
        }),
    )
    .await?;

    Ok(session_id)
}

/// Run the seed command.
pub async fn run(cmd: SeedCommand, global: Global) -> anyhow::Result<()> {
    let client = reqwest::Client::new();

    if !global.is_silent() {
        aprintln!(
            "{} device {} with {} calls...",
            p_b("Seeding"),
            cmd.device_id,
            cmd.count
        );
    }

    for index in 0..cmd.count as usize {
        let session_id = seed_call(&client, &cmd, index).await?;

        if global.is_verbose() {
            aprintln!("  [{}/{}] Created call {}", index + 1, cmd.count, session_id);
        }
    }

    if !global.is_silent() {
        aprintln!(
            "{} {} calls for device {}",
            p_g("Created"),
            cmd.count,
            cmd.device_id
        );
    }

    Ok(())
}
