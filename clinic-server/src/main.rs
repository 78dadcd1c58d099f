//! 诊所就诊流转服务主程序

mod settings;

use clap::Parser;
use clinic_web::WebServer;
use clinic_workflow::{
    services::{
        InMemoryAdmissionService, InMemoryAppointmentService, InMemoryBillingService,
    },
    CollaboratorServices, SideEffectOrchestrator, VisitStore, WorkflowEngine,
};
use settings::ServerSettings;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// 就诊流转服务命令行参数
#[derive(Parser, Debug)]
#[command(name = "clinic-server")]
#[command(about = "诊所就诊环节流转与队列引擎服务")]
struct Args {
    /// 服务器端口
    #[arg(short, long)]
    port: Option<u16>,

    /// 监听主机
    #[arg(long)]
    host: Option<String>,

    /// 配置文件路径
    #[arg(short, long)]
    config: Option<String>,

    /// 日志级别
    #[arg(short, long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut settings = ServerSettings::load(args.config.as_deref())?;
    if let Some(port) = args.port {
        settings.port = port;
    }
    if let Some(host) = args.host {
        settings.host = host;
    }
    if let Some(log_level) = args.log_level {
        settings.log_level = log_level;
    }

    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(settings.log_level.as_str())
        .init();

    info!("启动就诊流转服务...");
    info!("  监听地址: {}:{}", settings.host, settings.port);
    info!("  副作用超时: {}s", settings.hook_timeout_secs);
    match settings.consultation_rate {
        Some(rate) => info!("  兜底诊查费: {:.2}", rate),
        None => info!("  未配置诊查费，进入诊室不自动开单"),
    }

    // 组装协作服务（单机部署使用内存实现）
    let billing = match settings.consultation_rate {
        Some(rate) => InMemoryBillingService::with_default_rate(rate),
        None => InMemoryBillingService::new(),
    };
    let services = CollaboratorServices {
        billing: Arc::new(billing),
        appointments: Arc::new(InMemoryAppointmentService::new()),
        admissions: Arc::new(InMemoryAdmissionService::new()),
    };
    let orchestrator = SideEffectOrchestrator::with_timeout(
        services,
        Duration::from_secs(settings.hook_timeout_secs),
    );
    let engine = Arc::new(WorkflowEngine::with_orchestrator(
        VisitStore::new(),
        orchestrator,
    ));

    let addr: SocketAddr = format!("{}:{}", settings.host, settings.port).parse()?;
    WebServer::new(addr, engine).run().await?;

    Ok(())
}
