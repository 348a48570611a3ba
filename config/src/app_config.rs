use directories::ProjectDirs;
use std::{
    env,
    path::PathBuf,
};

const CONFIG_FOLDER_VAR: &str = "STICKYPIPE_CONFIG_DIR";

pub fn get_config_dir() -> PathBuf {
    if let Some(directory) = env::var_os(CONFIG_FOLDER_VAR) {
        PathBuf::from(directory)
    } else if let Some(proj_dirs) = project_directory() {
        proj_dirs.config_local_dir().to_path_buf()
    } else {
        PathBuf::from(".").join(".config")
    }
}

fn project_directory() -> Option<ProjectDirs> {
    ProjectDirs::from("io", "stickypipe", "stickypipe-agent")
}
