mod config_files;
mod drive_recovery;
mod walking_cycle;
