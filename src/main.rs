use clap::Parser;
use tracing_subscriber::EnvFilter;

use towerbot_runtime::config::MOTOR_PORT;
use towerbot_runtime::robot::Robot;

/// Competition robot runtime: teleop loop or autonomous routine.
#[derive(Parser)]
struct Args {
    /// Serial port for the motor bus
    #[arg(long, default_value = MOTOR_PORT)]
    port: String,

    /// Use simulated motors instead of hardware
    #[arg(long)]
    sim: bool,

    /// Run the autonomous routine instead of the teleop runtime
    #[arg(long)]
    auto: bool,
}

#[tokio::main]
async fn main() {
    // Setup logging (set RUST_LOG=info or debug)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init();

    let args = Args::parse();

    let robot = if args.sim {
        Robot::simulated()
    } else {
        match Robot::connect(&args.port) {
            Ok(robot) => robot,
            Err(e) => {
                eprintln!("Failed to bring up robot on {}: {}", args.port, e);
                std::process::exit(1);
            }
        }
    };

    if args.auto {
        // The routine blocks on completion handles, so it gets its own thread.
        let result = tokio::task::spawn_blocking(move || {
            let mut robot = robot;
            towerbot_runtime::autonomous::run(&mut robot);
        })
        .await;
        if let Err(e) = result {
            eprintln!("Autonomous error: {}", e);
            std::process::exit(1);
        }
    } else if let Err(e) = towerbot_runtime::runtime::run(robot).await {
        eprintln!("Runtime error: {}", e);
        std::process::exit(1);
    }
}
