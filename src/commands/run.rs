//! `ksvc run`

use anyhow::{Context as _, Result, bail};

use crate::Context;
use crate::controller::Controller;
use crate::ui;

pub fn run(ctx: &Context, namespace: Option<String>, once: bool) -> Result<()> {
    let namespace = namespace.or_else(|| ctx.config.namespace.clone());
    let store = ctx.config.store_path();

    if !ctx.quiet {
        ui::info(&format!(
            "Reconciling services in {} from {}",
            namespace.as_deref().unwrap_or("all namespaces"),
            store.display()
        ));
    }

    let mut controller = Controller::new(
        ctx.reconciler(),
        namespace,
        ctx.config.resync_interval(),
        ctx.config.backoff.clone(),
    );
    let report = controller
        .run(once, ctx.config.poll_interval())
        .with_context(|| format!("Failed to list services in {}", store.display()))?;

    ui::kv("Reconciled", &report.reconciled.to_string());
    ui::kv("Deferred", &report.deferred.to_string());
    ui::kv("Failed", &report.failed.to_string());
    if report.failed > 0 {
        bail!("{} service(s) failed to reconcile", report.failed);
    }
    Ok(())
}
