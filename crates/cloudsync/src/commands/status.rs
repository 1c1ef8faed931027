use cloudsync_config::Config;
use cloudsync_core::{ResourceKind, StateManager};
use colored::Colorize;
use std::collections::BTreeMap;

pub async fn handle(config: &Config) -> anyhow::Result<()> {
    let state = StateManager::new(&config.state_dir).load().await?;

    println!(
        "State: {}",
        config.state_dir.display().to_string().cyan()
    );
    println!("Updated: {}", state.updated_at.to_rfc3339());
    println!();

    if state.resources.is_empty() {
        println!("{}", "No resources recorded".dimmed());
        return Ok(());
    }

    let mut resources: BTreeMap<ResourceKind, usize> = BTreeMap::new();
    for rec in &state.resources {
        *resources.entry(rec.kind()).or_default() += 1;
    }
    let mut relations: BTreeMap<ResourceKind, usize> = BTreeMap::new();
    for rel in &state.relations {
        *relations.entry(rel.kind).or_default() += 1;
    }

    println!("{}", "Resources:".bold());
    for (kind, count) in &resources {
        println!("  {:<20} {}", kind.as_str().cyan(), count);
    }
    if !relations.is_empty() {
        println!("{}", "Instance relations:".bold());
        for (kind, count) in &relations {
            println!("  {:<20} {}", kind.as_str().cyan(), count);
        }
    }
    Ok(())
}
