pub mod device_directory;
