//! `ksvc reconcile` and `ksvc plan`

use anyhow::Result;
use colored::Colorize;

use crate::Context;
use crate::api::ObjectKey;
use crate::controller::error_chain;
use crate::error::ReconcileError;
use crate::reconciler::{Action, EndpointChange, ReconcilePlan, ServicePlan};
use crate::ui;

/// Print a failed reconciliation with advice and hand it back as an error
fn report_failure(key: &ObjectKey, err: ReconcileError) -> anyhow::Error {
    let category = err.category();
    ui::error(&format!("{key}: {}", error_chain(&err)));
    ui::dim(&format!("{category}: {}", category.advice()));
    anyhow::Error::new(err).context(format!("Failed to reconcile {key}"))
}

pub fn reconcile(ctx: &Context, key: &ObjectKey) -> Result<()> {
    let reconciler = ctx.reconciler();
    let outcome = reconciler
        .reconcile(key)
        .map_err(|e| report_failure(key, e))?;

    match (outcome.action, outcome.service_id) {
        (Action::RequeueAfter(delay), _) => {
            ui::warn(&format!(
                "KeystoneAPI in {} is not bootstrapped yet; try again in {}s",
                key.namespace,
                delay.as_secs()
            ));
        }
        (Action::Done, None) => {
            ui::info(&format!("{key} not found; nothing to do"));
        }
        (Action::Done, Some(id)) => {
            ui::success(&format!("{key} reconciled"));
            if !ctx.quiet {
                let summary = outcome.endpoints;
                ui::kv("Service ID", &id);
                ui::kv(
                    "Endpoints",
                    &format!(
                        "{} created, {} updated, {} unchanged",
                        summary.created, summary.modified, summary.no_change
                    ),
                );
            }
        }
    }
    Ok(())
}

pub fn plan(ctx: &Context, key: &ObjectKey, json: bool) -> Result<()> {
    let reconciler = ctx.reconciler();
    let plan = reconciler.plan(key).map_err(|e| report_failure(key, e))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    ui::header(&format!("Plan for {key}"));
    match plan {
        ReconcilePlan::Deferred { after_secs } => {
            ui::warn(&format!(
                "KeystoneAPI not bootstrapped; reconcile would requeue after {after_secs}s"
            ));
        }
        ReconcilePlan::Deleted => ui::info("Service not found; nothing to do"),
        ReconcilePlan::Ready {
            service,
            endpoints,
            summary,
        } => {
            ui::section("Service");
            match service {
                ServicePlan::Create { opts } => println!(
                    "  {} create {} service {}",
                    "+".green().bold(),
                    opts.service_type,
                    opts.name.bold()
                ),
                ServicePlan::Overwrite { id, opts } => println!(
                    "  {} overwrite {} service {} ({})",
                    "~".yellow().bold(),
                    opts.service_type,
                    opts.name.bold(),
                    id.dimmed()
                ),
            }

            ui::section("Endpoints");
            for endpoint in &endpoints {
                let role = format!("{:<8}", endpoint.role.as_str());
                let url = endpoint.url.as_deref().unwrap_or_default();
                match &endpoint.change {
                    EndpointChange::Unmanaged => {
                        println!("  {} {} {}", "-".dimmed(), role, "(no URL declared)".dimmed());
                    }
                    EndpointChange::Unchanged => {
                        println!("  {} {} {}", "=".dimmed(), role, url.dimmed());
                    }
                    EndpointChange::Add => println!("  {} {} {}", "+".green().bold(), role, url),
                    EndpointChange::Modify { from, to } => println!(
                        "  {} {} {} -> {}",
                        "~".yellow().bold(),
                        role,
                        from.dimmed(),
                        to
                    ),
                }
            }

            println!();
            if summary.has_changes() {
                ui::info(&format!(
                    "{} endpoint(s) to add, {} to update",
                    summary.additions, summary.modifications
                ));
            } else {
                ui::success("Endpoints up to date");
            }
        }
    }
    Ok(())
}
