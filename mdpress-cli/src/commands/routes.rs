//! List resolved dynamic routes.

use super::load_plugin;
use anyhow::Result;
use serde_json::Value;
use std::path::Path;

pub async fn list_routes(config_path: &Path, json: bool) -> Result<()> {
    let plugin = load_plugin(config_path, false).await?;
    let routes = &plugin.site().dynamic_routes.routes;

    if json {
        println!("{}", serde_json::to_string_pretty(routes)?);
        return Ok(());
    }

    if routes.is_empty() {
        println!("No dynamic routes.");
        return Ok(());
    }
    for route in routes {
        println!(
            "{} -> {} {}",
            route.route,
            route.path,
            Value::Object(route.params.clone())
        );
    }
    Ok(())
}
