pub mod files;
pub mod s3;

#[cfg(test)]
pub mod memory;
