//! Config command implementation

use crate::output::OutputWriter;
use crate::output_types::{ConfigEntry, ConfigOutput};
use anyhow::Result;
use geoweave_core::config::LayeredConfig;
use tabled::Tabled;

pub fn execute(config: &LayeredConfig, output: &OutputWriter) -> Result<()> {
    let mut values: Vec<ConfigEntry> = config
        .to_inspection_map()
        .into_iter()
        .map(|(key, (value, source))| ConfigEntry {
            key,
            value,
            source: format!("{:?}", source),
        })
        .collect();

    // Sort by key for consistent output
    values.sort_by(|a, b| a.key.cmp(&b.key));

    if output.is_json() {
        output.result(ConfigOutput { values })?;
        return Ok(());
    }

    #[derive(Tabled)]
    struct ConfigRow {
        #[tabled(rename = "Key")]
        key: String,
        #[tabled(rename = "Value")]
        value: String,
        #[tabled(rename = "Source")]
        source: String,
    }

    output.table(
        "Configuration Values",
        values
            .into_iter()
            .map(|entry| ConfigRow {
                key: entry.key,
                value: entry.value,
                source: entry.source,
            })
            .collect(),
    );

    output.info("Precedence: CLI arguments > environment variables > config file > defaults");

    Ok(())
}
