use std::process::ExitCode;

fn main() -> ExitCode {
    alexandra_cli::run()
}
