use std::{
    fs::create_dir_all,
    io::{self, ErrorKind},
    path::PathBuf,
};

use xdg::BaseDirectories;

/// Returns the path to the Kelp configuration directory. If it doesn't exist when this
/// function is called, it will be created.
pub fn config_dir() -> io::Result<PathBuf> {
    let path = xdg_prefix().get_config_home().ok_or_else(missing_home)?;

    create_dir_all(&path)?;

    Ok(path)
}

/// Returns the path to the Kelp state directory. If it doesn't exist when this function is
/// called, it will be created.
///
/// The persisted auth session lives here.
pub fn state_dir() -> io::Result<PathBuf> {
    let path = xdg_prefix().get_state_home().ok_or_else(missing_home)?;

    create_dir_all(&path)?;

    Ok(path)
}

fn missing_home() -> io::Error {
    io::Error::new(ErrorKind::NotFound, "$HOME must exist")
}

fn xdg_prefix() -> BaseDirectories {
    xdg::BaseDirectories::with_prefix("kelp")
}
