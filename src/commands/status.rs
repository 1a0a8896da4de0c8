//! `ksvc status`

use anyhow::{Context as _, Result};
use colored::Colorize;
use std::collections::BTreeSet;

use crate::Context;
use crate::api::{KeystoneService, ObjectKey};
use crate::store::{ObjectStore, StoreError};
use crate::ui;

pub fn run(ctx: &Context, key: Option<&ObjectKey>) -> Result<()> {
    let store = ctx.store();

    let services = match key {
        Some(key) => match store.get_service(key) {
            Ok(service) => vec![service],
            Err(StoreError::NotFound { .. }) => {
                ui::warn(&format!("{key} not found in {}", store.root().display()));
                return Ok(());
            }
            Err(e) => return Err(e).with_context(|| format!("Failed to read {key}")),
        },
        None => store
            .list_services(ctx.config.namespace.as_deref())
            .context("Failed to list services")?,
    };

    ui::header("Keystone Services");
    ui::kv("Store", &store.root().display().to_string());

    if services.is_empty() {
        ui::dim("No services declared");
        return Ok(());
    }

    let namespaces: BTreeSet<&str> = services
        .iter()
        .map(|s| s.metadata.namespace.as_str())
        .collect();
    for namespace in namespaces {
        ui::section(namespace);
        show_keystone(&store, ctx, namespace);
        for service in services.iter().filter(|s| s.metadata.namespace == namespace) {
            show_service(ctx, service);
        }
    }
    println!();
    Ok(())
}

fn show_keystone(store: &impl ObjectStore, ctx: &Context, namespace: &str) {
    let key = ObjectKey::new(namespace, &ctx.config.keystone_api_name);
    let state = match store.get_keystone_api(&key) {
        Ok(api) if api.status.bootstrap_hash.is_empty() => "bootstrapping".yellow(),
        Ok(_) => "ready".green(),
        Err(StoreError::NotFound { .. }) => "missing".red(),
        Err(e) => format!("unreadable ({e})").red(),
    };
    ui::kv(&format!("KeystoneAPI {}", key.name), &state.to_string());
}

fn show_service(ctx: &Context, service: &KeystoneService) {
    let id = match service.status.service_id() {
        Some(id) => id.green(),
        None => "not registered".yellow(),
    };
    println!(
        "  {} {} {} {}",
        service.metadata.name.bold(),
        format!("({})", service.spec.service_type).dimmed(),
        id,
        format!("v{}", service.metadata.resource_version).dimmed()
    );

    if ctx.verbose > 0 {
        for (role, url) in service.spec.endpoints() {
            let url = url.unwrap_or("-");
            println!("      {:<8} {}", role.as_str(), url.dimmed());
        }
    }
}
