//! Label printing types

/// Printable label content for one title
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedLabel {
    pub title: String,
    pub content: String,
    /// Always ≥ 1
    pub copies: u32,
}

/// All labels produced by one scan, submitted together
#[derive(Debug, Clone)]
pub struct PrintBatch {
    /// Scanned text that led to this batch, for diagnostics
    pub raw: String,
    /// Barcode value printed on the labels
    pub barcode: String,
    pub labels: Vec<RenderedLabel>,
}
