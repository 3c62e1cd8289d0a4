use crate::public_ip::IpResolver;
use crate::report::{self, ConsoleReporter};
use anyhow::Context;
use colored::Colorize;
use ipfence_cloud::{DesiredRule, NicType, PortRange, Protocol, Reconciler};
use ipfence_cloud_aliyun::{
    ACCESS_KEY_ID_ENV, ACCESS_KEY_SECRET_ENV, AliyunRuleStore, Credentials, EcsConfig,
};

/// Everything one `ipfence` run needs
#[derive(Debug, Clone)]
pub struct UpdateOptions {
    pub region_id: String,
    pub security_group_id: String,
    pub port_range: PortRange,
    pub ip_protocol: Protocol,
    pub description: String,
    pub endpoint: Option<String>,
    pub nic_type: NicType,
    pub priority: i32,
    /// Skip the lookup and use this address verbatim
    pub ip: Option<String>,
    pub dry_run: bool,
}

/// Returns whether the rule was authorized (or, for a dry run, planned)
pub async fn handle(options: UpdateOptions) -> anyhow::Result<bool> {
    // Credentials are checked before any network activity
    let credentials = Credentials::from_env().with_context(|| {
        format!(
            "認証情報が設定されていません。環境変数 {} と {} を設定してください",
            ACCESS_KEY_ID_ENV, ACCESS_KEY_SECRET_ENV
        )
    })?;

    let public_ip = match options.ip {
        Some(ip) => {
            println!("指定された IP アドレスを使用します: {}", ip.cyan());
            ip
        }
        None => {
            println!("公網 IP アドレスを取得中...");
            let ip = IpResolver::new()?.resolve().await?;
            println!("現在の公網 IP アドレス: {}", ip.cyan());
            ip
        }
    };

    let config = EcsConfig::new(credentials, &options.region_id, options.endpoint);
    tracing::debug!(
        "Using ECS endpoint {} (region {})",
        config.endpoint,
        config.region_id
    );
    let store = AliyunRuleStore::new(config)?;
    let reconciler = Reconciler::new(&store, &options.security_group_id);

    let desired = DesiredRule::new(
        options.ip_protocol,
        options.port_range,
        public_ip,
        options.description,
    )
    .with_nic_type(options.nic_type)
    .with_priority(options.priority);

    println!(
        "セキュリティグループ {} のルールを更新中...",
        options.security_group_id.cyan()
    );

    let plan = reconciler.plan(&desired).await;
    if let Some(e) = &plan.snapshot_error {
        println!(
            "  {} 既存ルールの取得に失敗しました。既存ルールなしとして続行します ({})",
            "⚠".yellow(),
            e.dimmed()
        );
    }
    if plan.is_current() && !plan.has_stale() {
        println!("  {}", "ルールは既に現在の IP を許可しています".dimmed());
    }

    if options.dry_run {
        report::print_plan(&plan);
        println!("{}", "ドライラン: 変更は行っていません".yellow());
        return Ok(true);
    }

    let result = reconciler.apply(&plan, &mut ConsoleReporter).await;
    tracing::debug!(
        "Converged {} in {} ms ({} revoked)",
        options.security_group_id,
        result.duration_ms,
        result.revoked_count()
    );

    println!();
    if result.is_success() {
        println!("{}", "✓ セキュリティグループルールの更新に成功しました！".green().bold());
        Ok(true)
    } else {
        println!("{}", "✗ セキュリティグループルールの更新に失敗しました！".red().bold());
        if result.revoked_count() > 0 {
            println!(
                "  {}",
                format!(
                    "削除済みの旧ルール {} 件は復元されていません",
                    result.revoked_count()
                )
                .yellow()
            );
        }
        Ok(false)
    }
}
