use colored::Colorize;
use ipfence_cloud::{CloudError, DesiredRule, FirewallRule, Plan, ReconcileObserver, RevokeOutcome};

/// Prints one line per converge step as it happens
#[derive(Debug, Default)]
pub struct ConsoleReporter;

impl ReconcileObserver for ConsoleReporter {
    fn revoking(&mut self, rule: &FirewallRule) {
        println!("  - 旧ルールを削除中: {}", rule.source_cidr.to_string().yellow());
    }

    fn revoked(&mut self, outcome: &RevokeOutcome) {
        match &outcome.error {
            None => println!(
                "  {} 旧ルールを削除しました: {}",
                "✓".green(),
                outcome.rule.source_cidr
            ),
            Some(e) => println!(
                "  {} 旧ルールの削除に失敗しました: {} ({})",
                "✗".red(),
                outcome.rule.source_cidr,
                e.dimmed()
            ),
        }
    }

    fn authorizing(&mut self, rule: &DesiredRule) {
        println!("  + 新ルールを追加中: {}", rule.source_cidr.to_string().cyan());
    }

    fn authorized(&mut self, rule: &DesiredRule, error: Option<&CloudError>) {
        match error {
            None => println!(
                "  {} 新ルールを追加しました: {}",
                "✓".green(),
                rule.source_cidr
            ),
            Some(e) => println!(
                "  {} 新ルールの追加に失敗しました: {} ({})",
                "✗".red(),
                rule.source_cidr,
                e.to_string().dimmed()
            ),
        }
    }
}

/// Print what `apply` would do without touching the group
pub fn print_plan(plan: &Plan) {
    println!();
    println!("{}", "実行計画:".bold());
    for rule in &plan.stale {
        println!("  {} revoke {}", "-".red(), rule);
    }
    println!(
        "  {} authorize {} {} from {} ({}, {}, priority {}) \"{}\"",
        "+".green(),
        plan.desired.protocol,
        plan.desired.port_range,
        plan.desired.source_cidr,
        plan.desired.nic_type,
        plan.desired.policy,
        plan.desired.priority,
        plan.desired.description
    );
    println!();
    println!("{}", plan.summary().to_string().dimmed());
}
