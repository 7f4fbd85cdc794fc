use anyhow::{bail, Context, Result};
use backfill_service::{
    config::{api_key_from_env, Cli, JobConfig, Settings},
    dry_run, observability, run,
};
use clap::Parser;
use orb_client::OrbClient;
use rand::{rngs::StdRng, SeedableRng};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    observability::init_tracing();

    let cli = Cli::parse();

    // Runtime settings (ORB_BACKFILL_SETTINGS may point at a TOML file).
    let settings = Settings::load()?;
    let job = JobConfig::resolve(&cli, settings)?;
    let mut rng = StdRng::from_os_rng();

    let report = if cli.dry_run {
        dry_run(&job, &mut rng)
    } else {
        let api_key = api_key_from_env()?;
        let client = OrbClient::new(&job.settings.api_url, &api_key, job.settings.request_timeout())
            .context("failed to build billing API client")?;
        run(&client, &job, &mut rng).await
    };

    report.log_summary();
    if let Some(failure) = report.failure {
        bail!("backfill failed at chunk {}: {}", failure.chunk, failure.error);
    }

    Ok(())
}
