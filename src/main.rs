use std::process::ExitCode;

fn main() -> ExitCode {
    match syncup::cli::run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(syncup::error::ErrorCategory::Internal.exit_code())
        }
    }
}
