//! Stop notification for a running service.
//!
//! # Responsibilities
//! - Wait for SIGINT/SIGTERM
//! - Run caller-supplied health checks that may ask the service to stop
//! - Log the first stop reason and stop the service
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - A failure to install a signal handler is logged; health checks still work

use futures_util::future::BoxFuture;
use tokio::sync::mpsc;

use crate::transport::Service;

/// A health check. It reports a stop reason on the sender when the service
/// should shut down, and may otherwise run forever.
pub type HealthCheck =
    Box<dyn FnOnce(mpsc::Sender<String>, Service) -> BoxFuture<'static, ()> + Send>;

/// Block until a signal arrives or a health check reports, then stop the service.
///
/// Returns the stop reason.
pub async fn handle_notify(service: &Service, health_checks: Vec<HealthCheck>) -> String {
    let (tx, mut rx) = mpsc::channel(health_checks.len() + 1);

    for check in health_checks {
        tokio::spawn(check(tx.clone(), service.clone()));
    }

    let signal_tx = tx.clone();
    let signals = tokio::spawn(async move {
        let reason = format!("received signal: {}", wait_for_signal().await);
        let _ = signal_tx.send(reason).await;
    });
    drop(tx);

    let reason = match rx.recv().await {
        Some(reason) => reason,
        None => "all health checks exited".to_string(),
    };
    signals.abort();

    tracing::info!("{}", reason);
    service.stop();
    reason
}

#[cfg(unix)]
async fn wait_for_signal() -> &'static str {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = match signal(SignalKind::terminate()) {
        Ok(term) => term,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to install SIGTERM handler");
            return wait_for_ctrl_c().await;
        }
    };

    tokio::select! {
        name = wait_for_ctrl_c() => name,
        _ = term.recv() => "terminated",
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> &'static str {
    wait_for_ctrl_c().await
}

async fn wait_for_ctrl_c() -> &'static str {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to install SIGINT handler");
        std::future::pending::<()>().await;
    }
    "interrupt"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{Connection, ServiceInfo};

    fn service() -> Service {
        Service::new(
            Connection::new(),
            ServiceInfo {
                name: "notify".into(),
                version: "0.0.1".into(),
                description: String::new(),
            },
        )
    }

    #[tokio::test]
    async fn test_health_check_stops_service() {
        let service = service();

        let failing: HealthCheck = Box::new(|tx, svc| {
            Box::pin(async move {
                let _ = tx.send(format!("{} unhealthy", svc.info().name)).await;
            })
        });
        let idle: HealthCheck = Box::new(|_tx, _svc| Box::pin(std::future::pending()));

        let reason = handle_notify(&service, vec![idle, failing]).await;

        assert_eq!(reason, "notify unhealthy");
        assert!(service.stopped());
    }
}
