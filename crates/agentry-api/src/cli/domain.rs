//! Domain CLI commands: register, list, status.

use comfy_table::{presets::UTF8_FULL, Table};

use crate::state::AppState;

/// `agentry register <domain>` -- register a domain and kick off
/// provisioning. Returns immediately; the deployment poller finishes the
/// job in the background (or on the next `serve` run for one-shot CLI use).
pub async fn register(state: &AppState, raw_domain: &str, json: bool) -> anyhow::Result<()> {
    let registration = state.domain_service.register(raw_domain).await?;
    let key = registration.domain.key();

    let agent_status = match state.registry.resolve(&key).await {
        Ok(record) => Some(record.status.to_string()),
        Err(err) => {
            tracing::warn!(domain = %registration.domain.domain_name, error = %err, "Agent provisioning could not start");
            None
        }
    };

    if json {
        let out = serde_json::json!({
            "domain_id": registration.domain.id.to_string(),
            "domain_name": registration.domain.domain_name,
            "domain_key": key.to_string(),
            "already_registered": !registration.newly_registered,
            "agent_status": agent_status,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!();
    if registration.newly_registered {
        println!(
            "  {} Registered {}",
            console::style("✓").green(),
            console::style(&registration.domain.domain_name).cyan()
        );
    } else {
        println!(
            "  {} {} was already registered",
            console::style("•").dim(),
            console::style(&registration.domain.domain_name).cyan()
        );
    }
    println!("    domain id:  {}", registration.domain.id);
    println!("    domain key: {key}");
    match agent_status {
        Some(status) => println!("    agent:      {status}"),
        None => println!(
            "    agent:      {}",
            console::style("provisioning could not start; retry later").yellow()
        ),
    }
    println!();
    Ok(())
}

/// `agentry list domains` -- table of registered domains and agent status.
pub async fn list_domains(state: &AppState, json: bool) -> anyhow::Result<()> {
    let domains = state.domain_service.list().await?;

    if json {
        let mut entries = Vec::with_capacity(domains.len());
        for domain in &domains {
            let record = state.registry.peek(&domain.key()).await?;
            entries.push(serde_json::json!({
                "domain_id": domain.id.to_string(),
                "domain_name": domain.domain_name,
                "domain_key": domain.key().to_string(),
                "agent_status": record.map(|r| r.status.to_string()),
                "created_at": domain.created_at.to_rfc3339(),
            }));
        }
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if domains.is_empty() {
        println!();
        println!("  No domains registered yet. Try `agentry register example.com`.");
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Domain", "Key", "Agent", "Registered"]);
    for domain in &domains {
        let record = state.registry.peek(&domain.key()).await?;
        table.add_row(vec![
            domain.domain_name.clone(),
            domain.key().to_string(),
            record
                .map(|r| r.status.to_string())
                .unwrap_or_else(|| "-".to_string()),
            domain.created_at.format("%Y-%m-%d %H:%M").to_string(),
        ]);
    }
    println!("{table}");
    Ok(())
}

/// `agentry status <domain>` -- detailed agent status for one domain.
pub async fn status(state: &AppState, raw_domain: &str, json: bool) -> anyhow::Result<()> {
    let domain = state.domain_service.get_by_name(raw_domain).await?;
    let key = domain.key();
    let record = state.registry.peek(&key).await?;

    if json {
        let out = serde_json::json!({
            "domain_id": domain.id.to_string(),
            "domain_name": domain.domain_name,
            "domain_key": key.to_string(),
            "agent": record.as_ref().map(|r| serde_json::json!({
                "agent_id": r.agent_id,
                "status": r.status.to_string(),
                "has_endpoint": r.endpoint_url.is_some(),
                "has_credential": r.credential.is_some(),
                "kb_ids": r.kb_ids,
                "updated_at": r.updated_at.to_rfc3339(),
            })),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} {}",
        console::style("Domain").bold(),
        console::style(&domain.domain_name).cyan()
    );
    println!("    id:  {}", domain.id);
    println!("    key: {key}");
    match record {
        Some(record) => {
            let check = |ok: bool| {
                if ok {
                    format!("{}", console::style("✓").green())
                } else {
                    format!("{}", console::style("✗").red())
                }
            };
            println!();
            println!("  {} Agent {}", console::style("Agent").bold(), record.agent_id);
            println!("    status:     {}", record.status);
            println!("    {} endpoint", check(record.endpoint_url.is_some()));
            println!("    {} credential", check(record.credential.is_some()));
            println!("    knowledge bases: {}", record.kb_ids.len());
        }
        None => {
            println!();
            println!(
                "  {} No agent yet -- it is created on first resolve/chat",
                console::style("•").dim()
            );
        }
    }
    println!();
    Ok(())
}
