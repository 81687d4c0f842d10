use std::path::Path;

use anyhow::Result;

use crate::ui::summary::print_environment_ready;

pub async fn start(config_file: Option<&Path>, environment: &str) -> Result<()> {
    let config = super::load_config(config_file)?;
    let orchestrator = super::build_orchestrator(&config)?;
    let record = orchestrator.start(environment).await?;
    print_environment_ready(&record);
    Ok(())
}

pub async fn stop(config_file: Option<&Path>, environment: &str) -> Result<()> {
    let config = super::load_config(config_file)?;
    let orchestrator = super::build_orchestrator(&config)?;
    let record = orchestrator.stop(environment).await?;
    println!("Stopped {}.", record.environment.name);
    Ok(())
}
