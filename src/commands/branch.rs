use std::path::Path;

use anyhow::Result;

use crate::ui::summary::print_environment_ready;

pub async fn run(config_file: Option<&Path>, source: &str, new_branch: &str) -> Result<()> {
    let config = super::load_config(config_file)?;
    let orchestrator = super::build_orchestrator(&config)?;
    let record = orchestrator.branch(source, new_branch).await?;
    print_environment_ready(&record);
    Ok(())
}
