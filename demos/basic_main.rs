//! # Example: basic_main
//!
//! Minimal application: one main function, no resources, no subscribers.
//!
//! Demonstrates how to:
//! - Define a main routine using [`MainFn`].
//! - Observe [`HoldOn`] to stop on Ctrl-C / SIGTERM.
//! - Return the run result as the process result.
//!
//! ## Flow
//! ```text
//! Application::run()
//!     ├─► CAS Init → Running
//!     ├─► install signal handlers
//!     ├─► spawn main ─► tick every 500ms
//!     ├─► SIGINT ─► halt() ─► hold-on closed ─► main returns
//!     └─► shutdown() ─► done closed ─► Ok(())
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example basic_main
//! # press Ctrl-C to stop
//! ```

use std::time::Duration;

use appvisor::{AppConfig, AppError, Application, HoldOn, MainFn, Scope};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Defaults: 1s termination timeout, 15s init timeout
    let cfg = AppConfig::default();

    // 2. A main that ticks until shutdown is requested
    let ticker = MainFn::arc("ticker", |_scope: Scope, hold_on: HoldOn| async move {
        let mut tick = 0u64;
        loop {
            tokio::select! {
                _ = hold_on.wait() => {
                    println!("[ticker] hold-on closed after {tick} ticks");
                    return Ok::<_, AppError>(());
                }
                _ = tokio::time::sleep(Duration::from_millis(500)) => {
                    tick += 1;
                    println!("[ticker] tick {tick}");
                }
            }
        }
    });

    // 3. Build and run
    let app = Application::builder(cfg).with_main(ticker).build();
    app.run().await?;

    println!("[basic_main] state: {:?}", app.state());
    Ok(())
}
