//! Gripper open-close demonstration.
//!
//! Connects to an RG gripper through a toolchanger (`--ip`, `--port`) or a
//! serial device (`--device`), opens it fully, closes it fully, then moves it
//! to the middle of its stroke, polling the status word between motions.

use std::time::Duration;

use clap::Parser;
use onrobot_rs::{GripperModel, RgError, RgGripper, TransportEndpoint, DEFAULT_FORCE};

#[derive(Debug, Parser)]
#[command(name = "rg_demo", about = "OnRobot RG gripper open-close demonstration")]
struct Args {
    /// Gripper model, rg2 or rg6
    #[arg(long, default_value = "rg6")]
    gripper: GripperModel,
    /// Toolchanger IP address (Modbus TCP)
    #[arg(long)]
    ip: Option<String>,
    /// Modbus TCP port
    #[arg(long, default_value_t = 502)]
    port: u16,
    /// Serial device path (Modbus RTU)
    #[arg(long)]
    device: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), RgError> {
    pretty_env_logger::init();
    let args = Args::parse();

    let endpoint = TransportEndpoint::resolve(args.ip, Some(args.port), args.device)?;
    let mut gripper = RgGripper::connect(args.gripper, endpoint).await?;

    if !gripper.get_status().await?.motion_ongoing {
        println!(
            "Current hand opening width: {} mm",
            gripper.get_width_with_offset().await?
        );

        gripper.open_gripper(DEFAULT_FORCE).await?;
        wait_until_settled(&mut gripper).await?;

        gripper.close_gripper(DEFAULT_FORCE).await?;
        wait_until_settled(&mut gripper).await?;

        // move to the middle point, 80.0 mm
        gripper.move_gripper(800, DEFAULT_FORCE).await?;
        wait_until_settled(&mut gripper).await?;
    }

    gripper.close_connection().await;
    Ok(())
}

/// Poll the status word every 500 ms until the motion flag clears.
async fn wait_until_settled(gripper: &mut RgGripper) -> Result<(), RgError> {
    loop {
        tokio::time::sleep(Duration::from_millis(500)).await;
        if !gripper.get_status().await?.motion_ongoing {
            return Ok(());
        }
    }
}
