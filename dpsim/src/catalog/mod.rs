pub mod record;
pub mod init_file;
pub mod manifest;
pub mod sweep;
