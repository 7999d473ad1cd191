use crate::config::SimulationSettings;
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use log::info;
use std::fs::File;
use std::path::Path;

/// Load and parse simulation settings from a YAML file
pub fn load_settings(settings_path: &Path) -> Result<SimulationSettings> {
    info!("Loading settings from: {:?}", settings_path);

    let file = File::open(settings_path)
        .wrap_err_with(|| format!("Failed to open settings file '{}'", settings_path.display()))?;

    let settings: SimulationSettings = serde_yaml::from_reader(file)
        .wrap_err_with(|| format!("Failed to parse settings file '{}'", settings_path.display()))?;

    settings.validate()?;

    info!("Using settings preset '{}'", settings.name);
    Ok(settings)
}

/// Load settings from `settings_path` when given, otherwise use the built-in preset
pub fn load_settings_or_default(settings_path: Option<&Path>) -> Result<SimulationSettings> {
    match settings_path {
        Some(path) => load_settings(path),
        None => {
            let settings = SimulationSettings::default();
            info!("No settings file given, using built-in preset '{}'", settings.name);
            Ok(settings)
        }
    }
}
