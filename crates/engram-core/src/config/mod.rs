pub mod paths;
pub mod settings;

pub use paths::{
    find_project_root, is_valid_engram_name, project_engrams_dir, CONTENT_DIR, ENGRAMS_DIR,
    MANIFEST_FILENAME, README_FILENAME,
};
pub use settings::Settings;
