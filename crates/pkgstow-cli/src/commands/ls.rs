//! `pkgstow ls`: list what is in the store.

use super::fail;
use miette::Result;
use pkgstow_core::Config;

pub fn run(config: &Config) -> Result<()> {
    let layout = config.layout();
    let installed = match layout.list_installed() {
        Ok(installed) => installed,
        Err(e) => fail(&e, config.json_logs),
    };

    if config.json_logs {
        let packages: Vec<_> = installed
            .iter()
            .map(|(name, version)| {
                serde_json::json!({
                    "name": name,
                    "version": version,
                    "path": layout.package_dir(name, version),
                })
            })
            .collect();
        println!("{}", serde_json::json!({ "ok": true, "packages": packages }));
        return Ok(());
    }

    if installed.is_empty() {
        println!("No packages installed in {}", layout.store_root().display());
    }
    for (name, version) in &installed {
        println!("{name}@{version}");
    }
    Ok(())
}
