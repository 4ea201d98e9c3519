/// A raw loaded document: full text plus file-level metadata. Immutable once
/// loaded; consumed once per ingestion run.
#[derive(Debug, Clone)]
pub struct Document {
    pub file_name: String,
    pub file_path: String,
    pub text: String,
}

impl Document {
    pub fn new(file_name: String, file_path: String, text: String) -> Self {
        Self {
            file_name,
            file_path,
            text,
        }
    }
}
