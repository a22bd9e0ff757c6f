use crate::output::{or_dash, print_json, print_table};
use geotrack_core::config::Config;

pub fn run(config: &Config, json: bool) -> anyhow::Result<()> {
    let tracker = super::build_tracker(config)?;
    let rt = tokio::runtime::Runtime::new()?;
    let devices = rt.block_on(tracker.list_devices())?;

    if json {
        return print_json(&devices);
    }
    if devices.is_empty() {
        println!("No devices on this account.");
        return Ok(());
    }

    let rows = devices
        .iter()
        .map(|d| {
            vec![
                d.imei.clone(),
                or_dash(d.name.as_deref()),
                or_dash(d.model.as_deref()),
                or_dash(d.plate.as_deref()),
                if d.enabled { "yes" } else { "no" }.to_string(),
            ]
        })
        .collect();
    print_table(&["IMEI", "NAME", "MODEL", "PLATE", "ENABLED"], rows);
    Ok(())
}
