//! Main entry point for the dedarc CLI app

use dedarc::ArchiverError;

fn main() -> std::process::ExitCode {
    if let Err(e) = dedarc::cli_runner::run_cli_app() {
        match e.downcast_ref::<ArchiverError>() {
            Some(archive_err) => eprintln!("Error ({}): {}", archive_err.stage(), archive_err),
            None => eprintln!("Error: {}", e),
        }
        return std::process::ExitCode::FAILURE;
    }
    std::process::ExitCode::SUCCESS
}
