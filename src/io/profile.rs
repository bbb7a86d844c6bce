//! Read/write source profile JSON files.
//!
//! A profile JSON is the portable form of a `SourceProfile`: users dump a
//! built-in preset with `tariff profile`, edit the column names, and pass it
//! back with `--profile`.

use std::fs::File;
use std::path::Path;

use log::info;

use crate::domain::SourceProfile;
use crate::error::AppError;

/// Write a profile as pretty JSON.
pub fn write_profile_json(path: &Path, profile: &SourceProfile) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::output(format!("Failed to create profile JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, profile)
        .map_err(|e| AppError::output(format!("Failed to write profile JSON: {e}")))?;
    info!("wrote {}", path.display());
    Ok(())
}

/// Read and validate a profile JSON file.
pub fn read_profile_json(path: &Path) -> Result<SourceProfile, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::input(format!("Failed to open profile JSON '{}': {e}", path.display())))?;
    let profile: SourceProfile =
        serde_json::from_reader(file).map_err(|e| AppError::input(format!("Invalid profile JSON: {e}")))?;
    profile.validate()?;
    Ok(profile)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Source;

    #[test]
    fn builtin_profiles_survive_a_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("china.json");
        let profile = Source::China.profile();
        write_profile_json(&path, &profile).unwrap();
        assert_eq!(read_profile_json(&path).unwrap(), profile);
    }

    #[test]
    fn invalid_profile_is_an_input_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{\"title\": \"x\"}").unwrap();
        let err = read_profile_json(&path).unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_INPUT);
    }
}
