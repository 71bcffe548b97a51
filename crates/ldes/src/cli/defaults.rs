use anyhow::Result;
use ldes_core::EngineConfig;

pub fn run() -> Result<()> {
    print!("{}", toml::to_string_pretty(&EngineConfig::default())?);
    Ok(())
}
