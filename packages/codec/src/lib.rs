//! Wire codec: turns a [`CanonicalDocument`] into the payload the downstream
//! receiver accepts. An operator template wins when one is given, otherwise
//! the built-in encoder for the document type is used.

pub mod defaults;
pub mod error;
pub mod sample;
pub mod template;
pub mod xml;

use common::{CanonicalDocument, DocType};
use tracing::debug;

pub use error::{CodecError, Result};
pub use template::WireTemplate;

/// Content type of the built-in encoders and the default for templates.
pub const XML_CONTENT_TYPE: &str = "application/xml; charset=utf-8";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub body: String,
    pub content_type: String,
}

/// Render `doc`, through `template` if given, else through the default encoder.
pub fn render(doc: &CanonicalDocument, template: Option<&WireTemplate>) -> Result<Rendered> {
    match template {
        Some(tpl) => Ok(Rendered {
            body: template::render_template(doc, tpl)?,
            content_type: tpl.content_type.clone(),
        }),
        None => {
            debug!(doc_type = %doc.doc_type, "No active template, using default encoder");
            Ok(Rendered {
                body: defaults::encode(doc),
                content_type: XML_CONTENT_TYPE.to_string(),
            })
        }
    }
}

/// Render the fixed sample document of `doc_type`.
pub fn preview(doc_type: DocType, template: Option<&WireTemplate>) -> Result<Rendered> {
    render(&sample::sample_document(doc_type), template)
}
