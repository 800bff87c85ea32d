use anyhow::Context;
use arcturus_supervisor::{ProcessSupervisor, SupervisorConfig};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

mod routes;
mod settings;

use settings::Settings;

/// Shared by every request handler. Built once in `main`.
#[derive(Clone)]
pub struct AppState {
    pub supervisor: Arc<ProcessSupervisor>,
    pub settings: Arc<Settings>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let settings = Settings::from_env()?;
    info!(
        root = %settings.arcturus_root.display(),
        binary = %settings.tileserver_binary_path.display(),
        config = %settings.tileserver_config_path.display(),
        "Resolved tileserver paths"
    );

    let supervisor = Arc::new(ProcessSupervisor::new(SupervisorConfig::new(
        &settings.tileserver_binary_path,
        &settings.tileserver_config_path,
    )));

    run(settings, supervisor, shutdown_signal()).await
}

/// Bind, start the tileserver, serve until `shutdown` resolves, then stop
/// the tileserver. Nothing is spawned unless the listener is bound.
async fn run<F>(
    settings: Settings,
    supervisor: Arc<ProcessSupervisor>,
    shutdown: F,
) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(settings.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", settings.listen_addr))?;
    let local_addr = listener.local_addr()?;

    // The API stays up without a tileserver so paths can be fixed and the
    // child started over HTTP.
    match supervisor.start().await {
        Ok(status) => info!(pid = ?status.pid, "Tileserver started"),
        Err(e) => error!(error = %e, "Tileserver did not start"),
    }

    let state = AppState {
        supervisor: supervisor.clone(),
        settings: Arc::new(settings),
    };

    info!("Server listening on http://{}", local_addr);
    let served = axum::serve(listener, routes::router(state))
        .with_graceful_shutdown(shutdown)
        .await;

    supervisor.shutdown().await;
    served?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
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

    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use arcturus_core::ProcessStatus;
    use arcturus_supervisor::{Launcher, ProcessHandle};
    use async_trait::async_trait;
    use std::io;
    use std::path::Path;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;

    #[derive(Default)]
    struct Counters {
        launches: AtomicUsize,
        terms: AtomicUsize,
    }

    struct IdleChild {
        alive: AtomicBool,
        counters: Arc<Counters>,
    }

    #[async_trait]
    impl ProcessHandle for IdleChild {
        fn pid(&self) -> u32 {
            4242
        }

        fn is_alive(&mut self) -> bool {
            self.alive.load(Ordering::SeqCst)
        }

        fn request_graceful_exit(&mut self) -> io::Result<()> {
            self.counters.terms.fetch_add(1, Ordering::SeqCst);
            self.alive.store(false, Ordering::SeqCst);
            Ok(())
        }

        fn force_kill(&mut self) -> io::Result<()> {
            self.alive.store(false, Ordering::SeqCst);
            Ok(())
        }

        fn send_reload(&mut self) -> io::Result<()> {
            Ok(())
        }

        async fn await_exit(&mut self, _timeout: Duration) -> bool {
            !self.alive.load(Ordering::SeqCst)
        }
    }

    struct CountingLauncher(Arc<Counters>);

    impl Launcher for CountingLauncher {
        fn launch(&self, _binary: &Path, _config: &Path) -> io::Result<Box<dyn ProcessHandle>> {
            self.0.launches.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(IdleChild {
                alive: AtomicBool::new(true),
                counters: self.0.clone(),
            }))
        }
    }

    fn create_server(
        listen_addr: std::net::SocketAddr,
    ) -> (TempDir, Settings, Arc<ProcessSupervisor>, Arc<Counters>) {
        let dir = tempfile::tempdir().unwrap();
        let binary = dir.path().join("tileserver-rs");
        let config = dir.path().join("tileserver.config.toml");
        std::fs::write(&binary, "").unwrap();
        std::fs::write(&config, "[server]\nport = 8081\n").unwrap();

        let settings = Settings {
            arcturus_root: dir.path().to_path_buf(),
            tileserver_config_path: config.clone(),
            tileserver_binary_path: binary.clone(),
            frontend_dist_path: dir.path().join("frontend/dist"),
            listen_addr,
        };
        let counters = Arc::new(Counters::default());
        let supervisor = Arc::new(ProcessSupervisor::with_launcher(
            SupervisorConfig::new(binary, config),
            Arc::new(CountingLauncher(counters.clone())),
        ));
        (dir, settings, supervisor, counters)
    }

    #[tokio::test]
    async fn test_bind_failure_spawns_nothing() {
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let (_dir, settings, supervisor, counters) = create_server(taken.local_addr().unwrap());

        let err = run(settings, supervisor.clone(), std::future::pending())
            .await
            .unwrap_err();

        assert!(err.to_string().starts_with("Failed to bind"));
        assert_eq!(counters.launches.load(Ordering::SeqCst), 0);
        assert_eq!(supervisor.status().await, ProcessStatus::stopped());
    }

    #[tokio::test]
    async fn test_shutdown_signal_stops_tileserver() {
        let (_dir, settings, supervisor, counters) =
            create_server("127.0.0.1:0".parse().unwrap());

        run(settings, supervisor.clone(), async {}).await.unwrap();

        assert_eq!(counters.launches.load(Ordering::SeqCst), 1);
        assert_eq!(counters.terms.load(Ordering::SeqCst), 1);
        assert_eq!(supervisor.status().await, ProcessStatus::stopped());
    }
}
