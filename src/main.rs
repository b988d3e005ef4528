use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cabride_client::{
    models::{
        driver::DriverStatus,
        user::{LoginRequest, UserIdentity},
    },
    AppState, ClientConfig, ClientResult,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cabride_client=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ClientConfig::from_env()?;
    tracing::info!("Using backend at {}", config.api_base_url);

    let state = AppState::new(config)?;
    let identity = match state.session.init().await? {
        Some(identity) => identity,
        None => match login_from_env(&state).await? {
            Some(identity) => identity,
            None => {
                tracing::info!("No stored session; set CABRIDE_EMAIL and CABRIDE_PASSWORD to log in");
                return Ok(());
            }
        },
    };
    tracing::info!("Signed in as {} ({:?})", identity.display_name(), identity.role);

    if identity.is_driver() {
        run_driver(&state).await?;
    } else {
        show_rider_dashboard(&state).await?;
    }
    Ok(())
}

async fn login_from_env(state: &AppState) -> ClientResult<Option<UserIdentity>> {
    let (Ok(email), Ok(password)) = (std::env::var("CABRIDE_EMAIL"), std::env::var("CABRIDE_PASSWORD")) else {
        return Ok(None);
    };
    let identity = state
        .session
        .login(state.api.as_ref(), &LoginRequest { email, password })
        .await?;
    Ok(Some(identity))
}

// Stay AVAILABLE, heartbeating, until interrupted.
async fn run_driver(state: &AppState) -> Result<(), Box<dyn std::error::Error>> {
    let driver = state.driver_availability();
    driver.toggle().await?;
    tracing::info!(
        "Sending location every {:?}; press Ctrl-C to go offline",
        state.config.heartbeat_interval
    );

    tokio::signal::ctrl_c().await?;

    if driver.status() == DriverStatus::Available {
        if let Err(e) = driver.toggle().await {
            tracing::warn!("Could not go offline cleanly: {}", e);
        }
    }
    driver.dispose();
    Ok(())
}

async fn show_rider_dashboard(state: &AppState) -> ClientResult<()> {
    if let Some(center) = state.config.device_position {
        let nearby = state.nearby_cabs();
        if nearby.start(center, state.config.nearby_radius_km).await.is_ok() {
            for cab in nearby.cabs() {
                tracing::info!("Cab nearby: {}", cab.label());
            }
        }
    }

    let history = state.ride_history();
    history.load_page(0).await?;
    for ride in history.rides() {
        tracing::info!(
            "Ride {} {} -> {}: {} ({})",
            ride.id,
            ride.pickup_address.as_deref().unwrap_or("?"),
            ride.dropoff_address.as_deref().unwrap_or("?"),
            ride.status.label(),
            ride.fare().map(|f| format!("{:.2}", f)).unwrap_or_else(|| "-".to_string())
        );
    }
    if history.has_more() {
        tracing::info!("More rides available");
    }
    Ok(())
}
