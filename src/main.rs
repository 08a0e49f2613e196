use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use ajsignal::demo::{define_sample_interface, SignalService, DEMO_NAMES};
use ajsignal::{
    init_logging, ClientConfig, ClientWorker, LocalAttachment, LocalBus, SignalConsumer,
    TracingOutput, BUILD_DATE, CONFIG_ENV, VERSION,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    init_logging()?;
    tracing::info!("ajsignal {} (built {})", VERSION, BUILD_DATE);

    let config_path = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
    let config = ClientConfig::load_or_default(config_path.as_deref())?;

    let bus = LocalBus::new();
    let mut service = SignalService::start(&bus, &config)?;

    let client = Arc::new(LocalAttachment::new(&bus, config.application_name.clone()));
    client.connect(&config.connect_spec)?;
    define_sample_interface(&client, &config)?;

    let (worker, actions) = ClientWorker::new(client.clone(), config.clone());
    let state = worker.state();
    let _consumer = SignalConsumer::attach(
        client.as_ref(),
        &config,
        Arc::new(actions),
        Arc::new(TracingOutput),
    )?;
    let worker_task = tokio::spawn(worker.run());

    client.find_advertised_name(&config.well_known_name)?;

    tokio::select! {
        result = async {
            let Some(join) = service.next_join().await else {
                return Ok(0);
            };
            let proxy = state.wait_for_proxy().await;
            tracing::info!("Proxy ready for {}{}", proxy.service_name, proxy.path);
            service
                .emit_names(join.session_id, DEMO_NAMES, Duration::from_millis(200))
                .await
        } => {
            let delivered = result?;
            tracing::info!("Demo finished, {} signal(s) delivered", delivered);
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted");
        }
    }

    state.shutdown();
    worker_task.await?;
    client.stop()?;
    service.stop()?;

    Ok(())
}
