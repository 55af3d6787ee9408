use alz_core::features::SchemaId;
use alz_core::train::{self, TrainParams};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// 打标的训练 CSV（需包含 schema 的全部列 + label 列）
    #[arg(long, default_value = "data/alzheimers_disease_data.csv")]
    csv: PathBuf,

    /// 工件输出目录
    #[arg(long, default_value = "models/clinical")]
    out_dir: PathBuf,

    /// 训练哪套特征 schema：clinical | assessment
    #[arg(long, default_value = "clinical")]
    schema: String,

    #[arg(long, default_value = "Diagnosis")]
    label_column: String,

    /// 留出集比例（按 label 分层）
    #[arg(long, default_value_t = 0.2)]
    test_size: f32,

    #[arg(long, default_value_t = 42)]
    seed: u64,

    #[arg(long, default_value_t = 200)]
    n_estimators: usize,

    #[arg(long, default_value_t = 15)]
    max_depth: usize,

    #[arg(long, default_value_t = 5)]
    min_samples_split: usize,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("info".parse().unwrap()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let schema: SchemaId = args.schema.parse()?;

    let params = TrainParams {
        csv: args.csv,
        out_dir: args.out_dir,
        schema,
        label_column: args.label_column,
        test_size: args.test_size,
        seed: args.seed,
        n_estimators: args.n_estimators,
        max_depth: args.max_depth,
        min_samples_split: args.min_samples_split,
    };

    let report = train::run(&params)?;
    println!("{report}");
    Ok(())
}
