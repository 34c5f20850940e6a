use std::process::ExitCode;

fn main() -> anyhow::Result<ExitCode> {
    let code = geotest_cli::run()?;
    Ok(ExitCode::from(code))
}
