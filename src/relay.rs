//! TCP relay that turns remote commands into excavator gestures.
//!
//! Frames are newline-delimited. A frame is either a JSON object
//! `{"action": "...", "value": "..."}` or the same JSON text sent as
//! whitespace-separated base-2 character codes. Every frame is answered with
//! `ok` or `err <reason>` on its own line.
//!
//! Commands from all connections run one at a time: a timed gesture keeps
//! the excavator until it has finished.

use std::sync::Arc;
use std::time::Duration;

use motor_shield::{MotorError, PinPort};
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::config::ExcavatorSettings;
use crate::excavator::Excavator;

/// Longest accepted frame in bytes, newline included.
pub const MAX_FRAME_LEN: usize = 4096;

pub type SharedExcavator<P> = Arc<Mutex<Excavator<P>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Action {
    Forward,
    Backward,
    Left,
    Right,
    ShovelLeft,
    ShovelRight,
    ShovelUp,
    ShovelDown,
    Stop,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Command {
    pub action: Action,
    /// Run time in whole seconds; ignored by `stop`.
    #[serde(default = "default_value")]
    pub value: String,
}

fn default_value() -> String {
    "0".to_string()
}

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("bad character code {0:?}")]
    Encoding(String),

    #[error("malformed command: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("invalid run time {0:?}")]
    InvalidDuration(String),

    #[error("motor failure: {0}")]
    Motor(#[from] MotorError),
}

#[derive(Debug, Clone, Copy)]
pub struct RelayOptions {
    /// Pause after every command before replying.
    pub settle: Duration,
    /// Upper bound on a single gesture's run time.
    pub max_run: Duration,
}

impl From<&ExcavatorSettings> for RelayOptions {
    fn from(settings: &ExcavatorSettings) -> Self {
        Self {
            settle: Duration::from_millis(settings.settle_ms),
            max_run: Duration::from_secs(settings.max_run_secs),
        }
    }
}

/// Decode one frame into a [`Command`].
pub fn decode_frame(frame: &str) -> Result<Command, RelayError> {
    let frame = frame.trim();
    if frame.starts_with('{') {
        return Ok(serde_json::from_str(frame)?);
    }

    let json = frame
        .split_whitespace()
        .map(|code| {
            u32::from_str_radix(code, 2)
                .ok()
                .and_then(char::from_u32)
                .ok_or_else(|| RelayError::Encoding(code.to_string()))
        })
        .collect::<Result<String, _>>()?;
    Ok(serde_json::from_str(&json)?)
}

fn run_duration(value: &str, max_run: Duration) -> Result<Duration, RelayError> {
    let secs = value
        .trim()
        .parse::<u64>()
        .map_err(|_| RelayError::InvalidDuration(value.to_string()))?;
    Ok(Duration::from_secs(secs).min(max_run))
}

fn start_gesture<P: PinPort>(excavator: &mut Excavator<P>, action: Action) -> motor_shield::Result<()> {
    match action {
        Action::Forward => excavator.move_forward(),
        Action::Backward => excavator.move_backward(),
        Action::Left => excavator.forward_left_chain(),
        Action::Right => excavator.forward_right_chain(),
        Action::ShovelLeft => excavator.turn_left_body(),
        Action::ShovelRight => excavator.turn_right_body(),
        Action::ShovelUp => excavator.move_up_shovel(),
        Action::ShovelDown => excavator.move_down_shovel(),
        Action::Stop => excavator.stop_all_motors(),
    }
}

async fn execute<P>(frame: &str, excavator: &SharedExcavator<P>, options: RelayOptions) -> Result<(), RelayError>
where
    P: PinPort,
{
    let command = decode_frame(frame)?;
    info!(action = ?command.action, value = %command.value, "Command received");
    let run_for = match command.action {
        Action::Stop => Duration::ZERO,
        _ => run_duration(&command.value, options.max_run)?,
    };

    let mut excavator = excavator.lock().await;
    if command.action == Action::Stop {
        excavator.stop_all_motors()?;
    } else {
        if let Err(err) = start_gesture(&mut *excavator, command.action) {
            if let Err(stop_err) = excavator.finish() {
                error!(%stop_err, "Could not stop a partially started gesture");
            }
            return Err(err.into());
        }
        tokio::time::sleep(run_for).await;
        excavator.finish()?;
    }

    tokio::time::sleep(options.settle).await;
    Ok(())
}

async fn handle_connection<P>(stream: TcpStream, excavator: SharedExcavator<P>, options: RelayOptions) -> anyhow::Result<()>
where
    P: PinPort,
{
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut frame = String::new();

    loop {
        frame.clear();
        let read = (&mut reader).take(MAX_FRAME_LEN as u64).read_line(&mut frame).await?;
        if read == 0 {
            break;
        }
        if read == MAX_FRAME_LEN && !frame.ends_with('\n') {
            warn!(len = read, "Frame too long, closing connection");
            writer
                .write_all(format!("err frame longer than {MAX_FRAME_LEN} bytes\n").as_bytes())
                .await?;
            break;
        }
        if frame.trim().is_empty() {
            continue;
        }
        let reply = match execute(&frame, &excavator, options).await {
            Ok(()) => "ok\n".to_string(),
            Err(err) => {
                warn!(%err, "Command failed");
                format!("err {err}\n")
            }
        };
        writer.write_all(reply.as_bytes()).await?;
    }
    Ok(())
}

/// Accept connections forever, serving each on its own task.
pub async fn serve<P>(listener: TcpListener, excavator: SharedExcavator<P>, options: RelayOptions) -> anyhow::Result<()>
where
    P: PinPort + Send + 'static,
    P::Pwm: Send,
{
    info!(addr = %listener.local_addr()?, "Relay listening");
    loop {
        let (stream, peer) = listener.accept().await?;
        info!(%peer, "Connected");
        let excavator = Arc::clone(&excavator);
        tokio::spawn(async move {
            match handle_connection(stream, excavator, options).await {
                Ok(()) => info!(%peer, "Disconnected"),
                Err(e) => error!(%peer, "Connection failed: {:?}", e),
            }
        });
    }
}
