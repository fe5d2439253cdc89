use std::process::ExitCode;

fn main() -> ExitCode {
    saiborg_cli::run()
}
