use std::path::Path;

use anyhow::Result;

use crate::ui::summary::print_environments;

/// Listing only reads the state database; no daemon needs to be reachable.
pub fn run(config_file: Option<&Path>, json: bool) -> Result<()> {
    let config = super::load_config(config_file)?;
    let store = super::open_store(&config)?;
    let records = store.list_environments(None)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
    } else {
        print_environments(&records);
    }
    Ok(())
}
