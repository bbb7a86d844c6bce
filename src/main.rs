use std::process::ExitCode;

fn main() -> ExitCode {
    // A `.env` file may set TARIFF_BOUNDARY or RUST_LOG.
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    match tariff_impact::app::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::from(err.exit_code())
        }
    }
}
