use geotrack_core::config::Config;
use geotrack_core::io;

pub fn run(config: &Config, port: Option<u16>, open: bool, no_auto_start: bool) -> anyhow::Result<()> {
    if config.has_errors() {
        anyhow::bail!("config has errors; run `geotrack config check` for details");
    }
    let tracker = super::build_tracker(config)?;
    io::ensure_dir(tracker.output_dir())?;

    let port = port.unwrap_or(config.server.port);
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        if config.auto_update.start_on_launch && !no_auto_start {
            let status = tracker.start_default()?;
            tracing::info!(interval_secs = status.interval_secs, "auto-update started");
        } else {
            tracing::info!("auto-update not started; POST /api/auto-update/start to begin");
        }
        geotrack_server::serve(tracker, port, open).await
    })
}
