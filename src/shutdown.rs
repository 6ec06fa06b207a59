//! SIGTERM/Ctrl-C graceful shutdown (SPEC_FULL.md §2.1, §6), adapted from
//! the teacher's `api::server::shutdown_signal` into a reusable future
//! shared by the HTTP listener, worker pool, reaper and sweeper.

use tracing::info;

pub async fn wait_for_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).expect("failed to install signal handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received");
}
