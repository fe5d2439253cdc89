use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkId(pub String);

/// One bounded span of document text, created at index time and never
/// mutated afterwards. The embedding itself lives next to the chunk inside
/// the vector store; it is not carried around the pipeline.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub id: ChunkId,
    /// Source file name (not the full path).
    pub source: String,
    /// 1-based page number inside the source document.
    pub page: u32,
    /// Position of this chunk within its page.
    pub seq: u32,
    pub text: String,
}

/// Citation metadata returned alongside assembled context.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub source: String,
    pub page: u32,
    pub score: f32,
}

#[cfg(test)]
mod tests {
    use super::{ChunkId, DocumentChunk};

    #[test]
    fn chunk_identity_is_its_id() {
        let chunk = DocumentChunk {
            id: ChunkId("returpolitik.pdf:3:0".to_string()),
            source: "returpolitik.pdf".to_string(),
            page: 3,
            seq: 0,
            text: "Returperioden er 30 dage.".to_string(),
        };

        assert_eq!(chunk.id, ChunkId("returpolitik.pdf:3:0".to_string()));
    }
}
