//! `pkgstow install <TARBALL>`.

use super::fail;
use miette::{IntoDiagnostic, Result};
use pkgstow_core::{cancellation, Config, InstallError, InstallOutcome, Installer};
use tracing::{info, warn};

pub fn run(config: &Config, tarball: &str) -> Result<()> {
    info!(cwd = %config.cwd.display(), tarball, "INSTALL command invoked");

    let rt = tokio::runtime::Runtime::new().into_diagnostic()?;
    match rt.block_on(install(config, tarball)) {
        Ok(outcome) => {
            print_outcome(&outcome, config.json_logs);
            Ok(())
        }
        Err(e) => fail(&e, config.json_logs),
    }
}

async fn install(config: &Config, tarball: &str) -> Result<InstallOutcome, InstallError> {
    let installer = Installer::from_config(config)?;
    let (handle, cancel) = cancellation();

    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling install");
            handle.cancel();
        }
    });

    let result = installer.install(tarball, &cancel).await;
    interrupt.abort();
    result
}

fn print_outcome(outcome: &InstallOutcome, json: bool) {
    if json {
        println!("{}", serde_json::json!({ "ok": true, "package": outcome }));
        return;
    }

    println!("Installed {}", outcome.key);
    println!("  store: {}", outcome.store_path.display());
    if let Some(shim) = &outcome.published_shim {
        println!("  main:  {}", shim.display());
    }
    if let Some(lib) = &outcome.published_lib {
        println!("  lib:   {}", lib.display());
    }
}
