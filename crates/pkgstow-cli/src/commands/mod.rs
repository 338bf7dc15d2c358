pub mod install;
pub mod ls;
pub mod version;

use pkgstow_core::InstallError;

/// Print an install failure and exit with status 1.
pub fn fail(err: &InstallError, json: bool) -> ! {
    if json {
        println!(
            "{}",
            serde_json::json!({
                "ok": false,
                "error": {
                    "code": err.code(),
                    "stage": err.stage(),
                    "message": err.message(),
                }
            })
        );
    } else {
        eprintln!("error: {err}");
    }
    std::process::exit(1);
}
