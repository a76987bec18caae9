pub const FIELD_IMAGE_URL: &str = "imageUrl";
pub const FIELD_PRODUCT_NAME: &str = "productName";
pub const FIELD_POST_DESCRIPTION: &str = "postDescription";
pub const FIELD_AI_LABELS: &str = "aiLabels";

pub const DOCUMENTS_SEPARATOR: &str = "/documents/";

pub const MAX_LABELS: u32 = 10;
pub const PRODUCT_NAME_PLACEHOLDER: &str = "N/A";

pub const STATUS_OK: &str = "ok";

/// Builds the caption prompt for a product name.
pub fn caption_prompt(product_name: &str) -> String {
    format!("Generate a short, creative caption for a product named '{product_name}'.")
}
