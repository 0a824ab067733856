use anyhow::Result;
use occlude::analysis::Analysis;
use occlude::settings;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let settings = settings::load_config()?;
    let mut analysis = Analysis::new(settings)?;

    analysis.run()?;
    analysis.writeup()?;

    Ok(())
}
