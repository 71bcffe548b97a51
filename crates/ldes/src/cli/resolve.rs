use std::path::Path;

use anyhow::Result;
use ldes_core::{EntityClass, EntityResolver};

use super::{load_config, load_taxonomy};

pub fn run(mention: &str, class: &str, config: Option<&Path>) -> Result<()> {
    let class: EntityClass = class.parse()?;
    let config = load_config(config)?;
    let resolver = EntityResolver::new(load_taxonomy(&config)?, &config.resolver);

    let resolution = resolver.resolve(mention, class);
    println!("{}", serde_json::to_string(&resolution)?);
    Ok(())
}
