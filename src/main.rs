use anyhow::Result;
use sph2cart::settings;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings = settings::load_config()?;
    let mapping = settings.binner().run()?;

    println!("{}", mapping.report);
    Ok(())
}
