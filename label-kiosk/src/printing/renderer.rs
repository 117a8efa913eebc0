//! Label renderer
//!
//! Turns one [`CompositeCode`] into one [`RenderedLabel`] per configured
//! title, by substituting the code's fields into the label template.

use super::template::LabelTemplate;
use super::types::RenderedLabel;
use crate::core::config::TitleCopies;
use crate::core::error::{RenderError, RenderResult};
use crate::scanning::CompositeCode;
use std::collections::HashMap;

/// Placeholder names that carry the barcode value; a template needs one
const BARCODE_SLOTS: [&str; 2] = ["barcode", "barCode"];

/// Label renderer
///
/// Stateless apart from the appliance host name, so rendering the same code
/// twice gives byte-identical labels.
#[derive(Debug, Clone)]
pub struct LabelRenderer {
    host_name: String,
}

impl LabelRenderer {
    pub fn new(host_name: impl Into<String>) -> Self {
        Self {
            host_name: host_name.into(),
        }
    }

    /// Renderer named after the machine it runs on
    pub fn for_this_host() -> Self {
        Self::new(sysinfo::System::host_name().unwrap_or_else(|| "kiosk".to_string()))
    }

    /// Render one label per title, in title order
    ///
    /// Fails with [`RenderError::MissingSlot`] when the template has no
    /// barcode placeholder.
    pub fn render(
        &self,
        code: &CompositeCode,
        template: &LabelTemplate,
        titles: &TitleCopies,
    ) -> RenderResult<Vec<RenderedLabel>> {
        let placeholders = template.placeholders();
        if !BARCODE_SLOTS.iter().any(|slot| placeholders.contains(slot)) {
            return Err(RenderError::MissingSlot(BARCODE_SLOTS[0]));
        }

        Ok(titles
            .iter()
            .map(|entry| {
                let values = self.substitutions(code, &entry.title, entry.copies);
                RenderedLabel {
                    title: entry.title.clone(),
                    content: template.substitute(&values),
                    copies: entry.copies,
                }
            })
            .collect())
    }

    fn substitutions(
        &self,
        code: &CompositeCode,
        title: &str,
        copies: u32,
    ) -> HashMap<&'static str, String> {
        let barcode = code.value();
        let mut values = HashMap::new();

        values.insert("labelTitle", title.to_string());
        values.insert("hostName", self.host_name.clone());
        values.insert("barcode", barcode.clone());
        values.insert("numCopies", copies.to_string());

        values.insert("symbology", code.symbology.as_str().to_string());
        values.insert("primaryValue", code.primary.clone());
        values.insert("secondaryField", code.secondary.clone().unwrap_or_default());
        values.insert("prefix", code.prefix.clone().unwrap_or_default());

        // Names used by older label templates
        values.insert("lblTitle", title.to_string());
        values.insert("barCode", barcode);

        values
    }
}
