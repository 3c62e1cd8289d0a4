mod commands;
mod public_ip;
mod report;

use clap::Parser;
use colored::Colorize;
use commands::update::UpdateOptions;
use ipfence_cloud::{DEFAULT_DESCRIPTION, DEFAULT_PRIORITY, NicType, PortRange, Protocol};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "ipfence", version)]
#[command(about = "セキュリティグループのルールを現在の公網 IP に追従させる", long_about = None)]
struct Cli {
    /// リージョン ID (例: cn-hangzhou)
    /// 環境変数 ALIBABA_CLOUD_REGION_ID からも読み込み可能
    #[arg(long, env = "ALIBABA_CLOUD_REGION_ID")]
    region_id: String,

    /// セキュリティグループ ID
    #[arg(long)]
    security_group_id: String,

    /// ポート範囲 (例: 22/22, -1/-1)
    #[arg(long, allow_hyphen_values = true)]
    port_range: PortRange,

    /// プロトコル (tcp, udp, icmp, all)
    #[arg(long, default_value = "tcp")]
    ip_protocol: Protocol,

    /// ルールの説明
    #[arg(long, default_value = DEFAULT_DESCRIPTION)]
    description: String,

    /// API エンドポイント (省略時は ecs.<region>.aliyuncs.com)
    #[arg(long)]
    endpoint: Option<String>,

    /// ネットワーク種別 (intranet, internet)
    #[arg(long, default_value = "intranet")]
    nic_type: NicType,

    /// ルールの優先度
    #[arg(long, default_value_t = DEFAULT_PRIORITY)]
    priority: i32,

    /// IP アドレスを直接指定（公網 IP の取得を省略）
    #[arg(long)]
    ip: Option<String>,

    /// 変更内容を表示するだけで実行しない
    #[arg(long)]
    dry_run: bool,

    /// 詳細なログを出力
    #[arg(short, long)]
    verbose: bool,
}

impl From<Cli> for UpdateOptions {
    fn from(cli: Cli) -> Self {
        Self {
            region_id: cli.region_id,
            security_group_id: cli.security_group_id,
            port_range: cli.port_range,
            ip_protocol: cli.ip_protocol,
            description: cli.description,
            endpoint: cli.endpoint,
            nic_type: cli.nic_type,
            priority: cli.priority,
            ip: cli.ip,
            dry_run: cli.dry_run,
        }
    }
}

/// stdoutは進捗表示に使うので、ログはstderrに出力
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match commands::update::handle(cli.into()).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}
