pub const JPEG_MIME_TYPE: &str = "image/jpeg";

/// Base64 text of a JPEG-compressed RGB image, ready to be inlined in a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub data: String,
    pub mime_type: &'static str,
}

impl EncodedImage {
    pub fn jpeg(data: String) -> Self {
        Self {
            data,
            mime_type: JPEG_MIME_TYPE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Part {
    Text(String),
    InlineImage(EncodedImage),
}

/// Ordered multimodal request sent to the model.
///
/// Part order carries meaning: the instruction refers to the images as
/// "first" and "second", so reordering them inverts the answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptPayload {
    parts: Vec<Part>,
}

impl PromptPayload {
    pub fn new(parts: Vec<Part>) -> Self {
        Self { parts }
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }
}

/// A configured, already-authenticated multimodal model.
///
/// Implementations turn a prompt into free text, or fail for any reason
/// (network, auth, quota, model side). Callers treat every failure alike.
pub trait ModelClient {
    type Error: std::error::Error + Send + Sync + 'static;

    fn generate(
        &self,
        payload: &PromptPayload,
    ) -> impl Future<Output = Result<String, Self::Error>> + Send;
}
