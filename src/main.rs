use anyhow::Result;
use std::sync::Arc;
use thermae::driver::{DiverterDriver, DriverCommand, RunOutcome};
use thermae::web::WebServer;
use tokio::sync::{Mutex, mpsc};
use tracing::{error, info};

/// Exit code a supervisor unit treats as "restart me" (see /reboot)
const REBOOT_EXIT_CODE: i32 = 75;

#[tokio::main]
async fn main() -> Result<()> {
    // Create driver command channel
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<DriverCommand>();

    let driver = DiverterDriver::new(cmd_tx.clone())
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create driver: {}", e))?;

    info!("Thermae hot-water diverter starting up");

    let (web_host, web_port) = {
        let cfg = driver.config();
        (cfg.web.host.clone(), cfg.web.port)
    };

    // Share driver with web server
    let driver_arc = Arc::new(Mutex::new(driver));

    let web_driver = driver_arc.clone();
    let web_task = tokio::spawn(async move {
        let web = WebServer::new(web_driver);
        if let Err(e) = web.start(&web_host, web_port).await {
            error!("Web server error: {}", e);
        }
    });

    // Run the driver loop in the current task
    let outcome = DiverterDriver::run(driver_arc.clone(), cmd_rx).await;
    web_task.abort();

    match outcome {
        Ok(RunOutcome::Shutdown) => {
            info!("Driver shutdown complete");
            Ok(())
        }
        Ok(RunOutcome::Reboot) => {
            info!("Restarting on operator request");
            std::process::exit(REBOOT_EXIT_CODE);
        }
        Err(e) => {
            error!("Driver failed with error: {}", e);
            Err(anyhow::anyhow!("Driver error: {}", e))
        }
    }
}
