use home_bridge::client::TadoClient;
use home_bridge::config::Config;
use home_bridge::connector::TadoConnector;
use home_bridge::entities::{climate, event};
use home_bridge::hub::{Dispatcher, Hub};
use home_bridge::models::tado::HomeId;
use home_bridge::vacuum::VacuumSession;
use log::{error, info, warn};
use std::rc::Rc;
use std::thread;
use std::time::{Duration, Instant};

fn resolve_home(client: &TadoClient, cfg: &Config) -> Result<HomeId, String> {
    if let Some(home_id) = cfg.home_id {
        return Ok(home_id);
    }

    let me = client.get_me().map_err(|e| format!("get_me failed: {}", e))?;
    let mut home_ids = me
        .homes
        .as_deref()
        .unwrap_or(&[])
        .iter()
        .filter_map(|hb| hb.id)
        .collect::<Vec<_>>();
    home_ids.sort_unstable_by_key(|h| h.0);
    home_ids.dedup();

    match home_ids.as_slice() {
        [] => Err("No homes found; ensure the account has homes".into()),
        [only] => Ok(*only),
        [first, ..] => {
            warn!(
                "Account has {} homes and HOME_ID is unset; bridging home {}",
                home_ids.len(),
                first.0
            );
            Ok(*first)
        }
    }
}

fn poll_loop(connector: &TadoConnector, interval: Duration) -> Result<(), String> {
    loop {
        let tick_start = Instant::now();

        connector.update()?;

        // Maintain steady cadence
        let elapsed = tick_start.elapsed();
        if elapsed < interval {
            thread::sleep(interval - elapsed);
        }
    }
}

pub fn run() -> Result<(), String> {
    // 1) Load config
    let cfg = Config::from_env()?;
    info!(
        "Config loaded (poll_interval={}s, overlay_fallback={:?}, home_id={})",
        cfg.poll_interval.as_secs(),
        cfg.overlay_fallback,
        cfg.home_id.map(|h| h.0.to_string()).unwrap_or_else(|| "-".to_string()),
    );

    // 2) Init thermostat client
    let client = TadoClient::new(cfg.tado_username.as_str(), cfg.tado_password.as_str())
        .map_err(|e| format!("Tado auth failed (credentials invalid?): {}", e))?;
    info!("Authenticated to Tado API");

    // 3) Resolve the home to bridge
    let home_id = resolve_home(&client, &cfg)?;
    info!("Bridging home {}", home_id.0);

    // 4) Hub plumbing and the thermostat connector
    let hub = Hub::new();
    let dispatcher = Dispatcher::new();
    let connector = Rc::new(TadoConnector::new(
        client,
        home_id,
        cfg.overlay_fallback,
        Rc::clone(&dispatcher),
    )?);

    // 5) Entities
    let climate_entities = climate::build_climate_entities(&connector, &hub, &dispatcher);
    info!("Created {} climate entity(ies)", climate_entities.len());

    // Held for the life of the loop so report delivery keeps working.
    let _vacuum_session = match &cfg.vacuum_manifest {
        Some(manifest) => {
            let session = VacuumSession::from_manifest(manifest)?;
            let event_entities = event::build_event_entities(&session, &hub);
            info!("Created {} vacuum event entity(ies)", event_entities.len());
            Some(session)
        }
        None => None,
    };

    // 6) Poll loop (steady cadence); entities republish on every signal
    info!("Starting poll loop: interval={}s", cfg.poll_interval.as_secs());
    poll_loop(&connector, cfg.poll_interval)
}

fn main() {
    let default_filter = env_logger::Env::default().default_filter_or("info");
    env_logger::Builder::from_env(default_filter)
        .format_timestamp_secs()
        .init();

    info!(
        "home-bridge {} (git {}) starting",
        env!("CARGO_PKG_VERSION"),
        env!("BUILD_TIME_GIT_HASH")
    );
    if let Err(e) = run() {
        error!("fatal: {}", e);
        std::process::exit(1);
    }
}
