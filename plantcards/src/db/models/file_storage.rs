/// Request to store file content
#[derive(Debug, Clone)]
pub struct FileStorageRequest {
    pub content: Vec<u8>,
    /// File extension without the dot, e.g. `webp`
    pub extension: String,
}

/// Response from storing file content
#[derive(Debug, Clone)]
pub struct FileStorageResponse {
    /// Relative key under the storage root, e.g. `3f/3fa85f64-5717-4562-b3fc-2c963f66afa6.webp`
    pub storage_key: String,
}
