mod routes;

use alz_core::{config::Config, features::SchemaId, pipeline::AppCore};
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use routes::AppState;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// 本进程服务的特征 schema：clinical | assessment
    #[arg(long, default_value = "clinical")]
    schema: String,

    /// 模型工件目录（forest.bin / scaler.bin / feature_schema.json / policy.json）
    #[arg(long, default_value = "models/clinical")]
    model_dir: PathBuf,

    #[arg(long, default_value_t = 5000)]
    port: u16,

    /// assessment 服务允许的跨域来源
    #[arg(long, default_value = "http://localhost:8080")]
    cors_origin: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("info".parse().unwrap()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // metrics recorder（进程内全局一次）
    let prom = PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install prometheus recorder");

    let args = Args::parse();
    let schema: SchemaId = args.schema.parse()?;
    let cfg = Config {
        schema,
        model_dir: args.model_dir,
        ..Config::default()
    };

    // 模型在进入服务循环之前加载一次；缺工件就以 not-ready 起服务
    let core = Arc::new(AppCore::load_or_empty(cfg));
    let state = AppState { core, prom };
    let app = routes::router(schema, &args.cors_origin, state)?;

    let addr = SocketAddr::from(([127, 0, 0, 1], args.port));
    tracing::info!("alz-server listening on http://{addr} (schema={schema})");
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app).await?;
    Ok(())
}
