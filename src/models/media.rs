use bytes::Bytes;

/// A binary attachment to upload under a document's prefix.
#[derive(Clone, Debug)]
pub struct MediaFile {
    /// Final path component of the stored key.
    pub name: String,
    pub data: Bytes,
}

impl MediaFile {
    pub fn new(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }

    /// MIME type guessed from the file extension.
    pub fn content_type(&self) -> String {
        content_type_for(&self.name)
    }
}

/// MIME type for an object name, `application/octet-stream` when unknown.
pub fn content_type_for(name: &str) -> String {
    mime_guess::from_path(name)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}
