use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio::signal::ctrl_c;
use tracing::info;

use crate::api::{self, AppState, ROUTES};
use crate::clients::{FirestoreClient, GcsClient, GoogleAuth, HuggingFaceClient};
use crate::config::{Backend, Config};
use crate::services::{
    ComplaintStore, FirestoreComplaintStore, GcsImageStorage, ImageStorage,
    InMemoryComplaintStore, InMemoryImageStorage, LlmService,
};
use crate::utils::logging::{log_routes, log_startup};
use crate::workflow::ComplaintFlow;

/// 应用主结构
pub struct App {
    config: Config,
    state: AppState,
}

impl App {
    /// 初始化应用：按配置组装存储后端和外部服务
    pub async fn initialize(config: Config) -> Result<Self> {
        log_startup(&config);
        config.warn_missing();

        let flow = build_flow(&config);
        let state = AppState::new(flow, &config);

        Ok(Self { config, state })
    }

    /// 绑定端口并运行，直到收到退出信号
    pub async fn run(self) -> Result<()> {
        let router = api::router(self.state, &self.config);
        log_routes(ROUTES);

        let address = format!("0.0.0.0:{}", self.config.port);
        let listener = TcpListener::bind(&address)
            .await
            .with_context(|| format!("绑定地址失败: {}", address))?;
        info!("✓ 服务已启动: http://{}", address);

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("HTTP 服务异常退出")?;

        info!("👋 服务已停止");
        Ok(())
    }
}

/// 根据配置组装投诉处理流程
pub fn build_flow(config: &Config) -> ComplaintFlow {
    let (store, storage): (Arc<dyn ComplaintStore>, Arc<dyn ImageStorage>) = match config.backend {
        Backend::Memory => (
            Arc::new(InMemoryComplaintStore::new()),
            Arc::new(InMemoryImageStorage::new()),
        ),
        Backend::Google => {
            let auth = GoogleAuth::from_config(config);
            (
                Arc::new(FirestoreComplaintStore::new(FirestoreClient::new(config, auth.clone()))),
                Arc::new(GcsImageStorage::new(GcsClient::new(config, auth))),
            )
        }
    };

    ComplaintFlow::new(
        storage,
        Arc::new(HuggingFaceClient::new(config)),
        Arc::new(LlmService::new(config)),
        store,
    )
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match ctrl_c().await {
            Ok(()) => info!("收到 Ctrl+C，正在关闭"),
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("收到终止信号，正在关闭");
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
