mod config;
mod excavator;
mod relay;

use std::sync::Arc;

use anyhow::Context;
use motor_shield::sim::DryRunPort;
use motor_shield::{DirectionTable, MotorController, PinPort};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::{PortKind, Settings};
use crate::excavator::Excavator;
use crate::relay::RelayOptions;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| config::DEFAULT_CONFIG_PATH.to_string());
    let settings = config::load_settings(&path).with_context(|| format!("loading configuration from {path}"))?;

    match settings.pins.port {
        PortKind::DryRun => run_node(DryRunPort::new(), &settings).await,
        #[cfg(feature = "rppal")]
        PortKind::Rppal => {
            let port = motor_shield::rpi::RppalPort::new().context("opening Raspberry Pi GPIO")?;
            run_node(port, &settings).await
        }
        #[cfg(not(feature = "rppal"))]
        PortKind::Rppal => anyhow::bail!("pins.port = \"rppal\" needs a build with `--features rppal`"),
    }
}

async fn run_node<P>(port: P, settings: &Settings) -> anyhow::Result<()>
where
    P: PinPort + Send + 'static,
    P::Pwm: Send,
{
    info!(port = ?settings.pins.port, "Excavator motor node started. Configuring the motor shield...");
    let mut motors = MotorController::with_options(
        port,
        settings.pins.numbering,
        DirectionTable::L293D_SHIELD,
        settings.motors.stop_mode,
    )?;
    motors.configure_direction_bus(settings.pins.latch, settings.pins.clock, settings.pins.serial)?;
    motors.configure_motor_pins(settings.pins.motor_pins())?;
    motors.set_pwm_frequencies(settings.motors.pwm_frequencies()?)?;

    let excavator = Arc::new(Mutex::new(Excavator::new(motors, settings.excavator.speed)));
    let listener = TcpListener::bind((settings.relay.host.as_str(), settings.relay.port))
        .await
        .with_context(|| format!("binding relay to {}:{}", settings.relay.host, settings.relay.port))?;
    let options = RelayOptions::from(&settings.excavator);

    tokio::select! {
        result = relay::serve(listener, Arc::clone(&excavator), options) => {
            if let Err(e) = &result {
                error!("Relay stopped: {:?}", e);
            }
            result?;
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("waiting for Ctrl-C")?;
            info!("Ctrl-C received, shutting down");
        }
    }

    match Arc::try_unwrap(excavator) {
        Ok(excavator) => excavator.into_inner().shutdown()?,
        Err(shared) => {
            // Connection tasks still hold the excavator; the controller is
            // released when the runtime drops them.
            if let Ok(mut excavator) = shared.try_lock() {
                warn!("Connections still open, stopping motors before exit");
                excavator.stop_all_motors()?;
            } else {
                warn!("A gesture is still running, motors stop when its connection is dropped");
            }
        }
    }
    info!("Motor node stopped");
    Ok(())
}
