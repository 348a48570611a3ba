use crate::Args;
use color_eyre::Result;
use std::sync::Arc;
use stickypipe_collector::{
    sink,
    FleetScheduler,
    Sink,
};
use stickypipe_config::Config;
use tokio_util::sync::CancellationToken;

pub struct App {
    config: Config,
}

impl App {
    pub fn new(args: Args) -> Result<Self> {
        Ok(Self {
            config: Config::new(&args)?,
        })
    }

    pub async fn run(self) -> Result<()> {
        let sink: Arc<dyn Sink> = Arc::from(sink::from_config(&self.config.sink));
        info!(
            endpoints = self.config.endpoints.len(),
            sink = self.config.sink.url.as_ref().map_or("stdout", |url| url.as_str()),
            "Starting stickypipe agent"
        );

        let cancel = CancellationToken::new();
        tokio::spawn(cancel_on_shutdown(cancel.clone()));

        FleetScheduler::from_config(&self.config, sink).run(cancel).await;
        Ok(())
    }
}

/// Cancels `token` on ctrl-c, or SIGTERM on unix.
async fn cancel_on_shutdown(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for ctrl-c: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!("Failed to listen for SIGTERM: {err}");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown requested, finishing the current cycle");
    token.cancel();
}
