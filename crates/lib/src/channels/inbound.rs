//! Inbound message shapes and text/attachment extraction.
//!
//! A message carries several optional nested fields (plain text, quoted text,
//! captioned document, image). Extraction is an ordered preference list
//! evaluated top-to-bottom; the first non-empty match wins.

/// Whether a batch is live traffic or history backfill. Only live batches are relayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchKind {
    Live,
    History,
}

/// A batch of inbound messages as delivered by the transport.
#[derive(Debug, Clone)]
pub struct MessageBatch {
    pub kind: BatchKind,
    pub messages: Vec<InboundMessage>,
}

/// One inbound message. Sender and content are both optional on the wire.
#[derive(Debug, Clone, Default)]
pub struct InboundMessage {
    pub sender: Option<String>,
    pub content: Option<MessageContent>,
}

/// Message content variants. A real message usually sets exactly one field,
/// but nothing on the wire guarantees that.
#[derive(Debug, Clone, Default)]
pub struct MessageContent {
    /// Plain conversation text.
    pub text: Option<String>,
    /// Extended/quoted text (reply context, link previews).
    pub extended_text: Option<String>,
    pub document: Option<DocumentContent>,
    pub image: Option<ImageContent>,
}

/// A document attachment with optional caption and metadata.
#[derive(Debug, Clone)]
pub struct DocumentContent {
    pub caption: Option<String>,
    pub filename: Option<String>,
    pub mimetype: Option<String>,
    pub media: MediaRef,
}

/// An image attachment with optional caption.
#[derive(Debug, Clone)]
pub struct ImageContent {
    pub caption: Option<String>,
    pub mimetype: Option<String>,
    pub media: MediaRef,
}

/// Opaque transport handle for downloading attachment bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRef {
    pub id: String,
}

/// An attachment selected for relay: media handle plus resolved filename and MIME type.
#[derive(Debug, Clone)]
pub struct AttachmentRef {
    pub media: MediaRef,
    pub filename: String,
    pub mimetype: String,
}

fn non_empty(s: &Option<String>) -> Option<&str> {
    s.as_deref().map(str::trim).filter(|t| !t.is_empty())
}

/// Best-available text. Precedence: plain text, extended/quoted text,
/// document caption, image caption. Returns an empty string when none match.
pub fn extract_text(content: &MessageContent) -> String {
    non_empty(&content.text)
        .or_else(|| non_empty(&content.extended_text))
        .or_else(|| content.document.as_ref().and_then(|d| non_empty(&d.caption)))
        .or_else(|| content.image.as_ref().and_then(|i| non_empty(&i.caption)))
        .unwrap_or_default()
        .to_string()
}

/// At most one attachment. Precedence: captioned document, bare document, image.
pub fn extract_attachment(content: &MessageContent) -> Option<AttachmentRef> {
    let captioned_doc = content
        .document
        .as_ref()
        .filter(|d| non_empty(&d.caption).is_some());
    let doc = captioned_doc.or(content.document.as_ref());
    if let Some(doc) = doc {
        return Some(AttachmentRef {
            media: doc.media.clone(),
            filename: non_empty(&doc.filename).unwrap_or("document").to_string(),
            mimetype: non_empty(&doc.mimetype)
                .unwrap_or("application/octet-stream")
                .to_string(),
        });
    }
    content.image.as_ref().map(|img| {
        let mimetype = non_empty(&img.mimetype).unwrap_or("image/jpeg").to_string();
        let ext = mimetype.split('/').nth(1).unwrap_or("bin");
        AttachmentRef {
            media: img.media.clone(),
            filename: format!("image.{}", ext),
            mimetype,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(caption: Option<&str>) -> DocumentContent {
        DocumentContent {
            caption: caption.map(String::from),
            filename: Some("report.pdf".to_string()),
            mimetype: Some("application/pdf".to_string()),
            media: MediaRef { id: "doc-1".to_string() },
        }
    }

    fn image(caption: Option<&str>) -> ImageContent {
        ImageContent {
            caption: caption.map(String::from),
            mimetype: Some("image/png".to_string()),
            media: MediaRef { id: "img-1".to_string() },
        }
    }

    #[test]
    fn plain_text_wins_over_everything() {
        let content = MessageContent {
            text: Some("hello".to_string()),
            extended_text: Some("quoted".to_string()),
            document: Some(doc(Some("doc caption"))),
            image: Some(image(Some("img caption"))),
        };
        assert_eq!(extract_text(&content), "hello");
    }

    #[test]
    fn extended_text_beats_captions() {
        let content = MessageContent {
            extended_text: Some("quoted".to_string()),
            document: Some(doc(Some("doc caption"))),
            ..Default::default()
        };
        assert_eq!(extract_text(&content), "quoted");
    }

    #[test]
    fn document_caption_beats_image_caption() {
        let content = MessageContent {
            document: Some(doc(Some("doc caption"))),
            image: Some(image(Some("img caption"))),
            ..Default::default()
        };
        assert_eq!(extract_text(&content), "doc caption");
    }

    #[test]
    fn whitespace_only_text_falls_through() {
        let content = MessageContent {
            text: Some("   ".to_string()),
            image: Some(image(Some("img caption"))),
            ..Default::default()
        };
        assert_eq!(extract_text(&content), "img caption");
    }

    #[test]
    fn no_text_anywhere_is_empty() {
        assert_eq!(extract_text(&MessageContent::default()), "");
    }

    #[test]
    fn document_preferred_over_image() {
        let content = MessageContent {
            document: Some(doc(None)),
            image: Some(image(None)),
            ..Default::default()
        };
        let att = extract_attachment(&content).expect("attachment");
        assert_eq!(att.media.id, "doc-1");
        assert_eq!(att.filename, "report.pdf");
        assert_eq!(att.mimetype, "application/pdf");
    }

    #[test]
    fn image_when_no_document() {
        let content = MessageContent {
            image: Some(image(None)),
            ..Default::default()
        };
        let att = extract_attachment(&content).expect("attachment");
        assert_eq!(att.media.id, "img-1");
        assert_eq!(att.filename, "image.png");
        assert_eq!(att.mimetype, "image/png");
    }

    #[test]
    fn document_metadata_defaults() {
        let content = MessageContent {
            document: Some(DocumentContent {
                caption: None,
                filename: None,
                mimetype: None,
                media: MediaRef { id: "doc-2".to_string() },
            }),
            ..Default::default()
        };
        let att = extract_attachment(&content).expect("attachment");
        assert_eq!(att.filename, "document");
        assert_eq!(att.mimetype, "application/octet-stream");
    }

    #[test]
    fn no_attachment_fields_is_none() {
        assert!(extract_attachment(&MessageContent::default()).is_none());
    }
}
