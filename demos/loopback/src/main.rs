//! Loopback demo: a scripted design-mode host driving a session controller
//! over the in-process channel.
//!
//! Run with: cargo run -p loopback-demo
//!
//! Set `RUST_LOG=debug` to see every message the controller classifies.

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use design_mode_core::{
    CustomHostLaunchAck, DiscoveryRequestPayload, Endpoint, HostLauncher, Message, MessageLevel,
    MessageType, RequestExecutor, ResultSink, RunRequest, RunRequestPayload, TestCase,
    TestMessagePayload, TestProcessStartInfo, codec,
};
use design_mode_session::{ControllerRegistry, SessionConfig};
use design_mode_transport::HostEnd;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Executor that pretends to run tests and reports through the sink.
struct EchoExecutor;

#[async_trait]
impl RequestExecutor for EchoExecutor {
    async fn run_tests(
        &self,
        request: RunRequest,
        launcher: Arc<dyn HostLauncher>,
        sink: Arc<dyn ResultSink>,
    ) {
        if request.kind.uses_custom_host() {
            match launcher
                .launch_custom_host(TestProcessStartInfo::new("testhost", "--parent-process"))
                .await
            {
                Ok(pid) => tracing::info!(pid, "running tests in custom host"),
                Err(e) => {
                    let _ = sink
                        .send_test_message(MessageLevel::Error, &e.to_string())
                        .await;
                    return;
                }
            }
        }

        for case in &request.payload.test_cases {
            let traits: Vec<String> = case
                .traits
                .iter()
                .map(|t| format!("{}={}", t.name, t.value))
                .collect();
            let text = format!("ran {} [{}]", case.fully_qualified_name, traits.join(", "));
            let _ = sink.send_test_message(MessageLevel::Informational, &text).await;
        }
        let _ = sink.send(Message::bare(MessageType::RunComplete)).await;
    }

    async fn discover_tests(&self, payload: DiscoveryRequestPayload, sink: Arc<dyn ResultSink>) {
        tracing::info!(sources = ?payload.sources, "discovering");
        let _ = sink.send(Message::bare(MessageType::DiscoveryComplete)).await;
    }

    fn cancel_run(&self) {
        tracing::info!("run cancelled");
    }

    fn abort_run(&self) {
        tracing::info!("run aborted");
    }

    fn cancel_discovery(&self) {
        tracing::info!("discovery cancelled");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = SessionConfig::from_env();
    let registry = ControllerRegistry::new();
    let (client, host) = design_mode_transport::pair();
    let controller = registry.initialize(Arc::new(client), config);

    let host_task = tokio::spawn(run_host(host));
    controller
        .connect_and_process(&Endpoint::localhost(12_345), Arc::new(EchoExecutor))
        .await
        .context("design-mode session failed")?;

    host_task.await.context("host task panicked")??;
    tracing::info!(state = ?controller.state(), "session finished");
    Ok(())
}

/// Plays the IDE side of one session.
async fn run_host(mut host: HostEnd) -> anyhow::Result<()> {
    host.accept();
    host.send(Message::new(MessageType::VersionCheck, 7.into()))?;

    let cases = vec![
        TestCase::new("Calculator.Adds", "executor://demo", "calculator.dll")
            .with_trait("Category", "Fast"),
        TestCase::new("Calculator.Divides", "executor://demo", "calculator.dll")
            .with_trait("Category", "Fast")
            .with_trait("Owner", "math"),
    ];
    let run = RunRequestPayload {
        test_cases: cases,
        ..RunRequestPayload::default()
    };
    host.send(codec::message_with(MessageType::StartInfoForRunSelected, &run)?)?;

    while let Some(message) = host.recv().await {
        match message.message_type {
            MessageType::CustomHostLaunch => {
                let start_info: TestProcessStartInfo = codec::decode_payload(&message)?;
                tracing::info!(file_name = %start_info.file_name, "host launching test host");
                let pid = i32::try_from(std::process::id()).unwrap_or(1);
                host.send(codec::message_with(
                    MessageType::CustomHostLaunchAck,
                    &CustomHostLaunchAck::launched(pid),
                )?)?;
            }
            MessageType::TestMessage => {
                let payload: TestMessagePayload = codec::decode_payload(&message)?;
                tracing::info!(level = ?payload.message_level, "{}", payload.message);
            }
            MessageType::RunComplete => {
                host.send(Message::bare(MessageType::SessionEnd))?;
                break;
            }
            other => tracing::info!(message_type = %other, "host received"),
        }
    }
    Ok(())
}
