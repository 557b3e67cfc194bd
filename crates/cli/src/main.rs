use std::process::ExitCode;

fn main() -> ExitCode {
    grievance_cli::run()
}
