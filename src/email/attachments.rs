use base64::{Engine, engine::general_purpose};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

use crate::email::EmailError;

pub const DEFAULT_ATTACHMENT_NAME: &str = "attachment.pdf";
pub const DEFAULT_ENCODING: &str = "base64";
pub const DEFAULT_CONTENT_TYPE: &str = "application/pdf";

/// Attachment as supplied by callers. Three wire shapes are accepted: a bare
/// path string, an object carrying inline content, and an object naming a
/// file on disk. An object with both `content` and `path` is inline.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum AttachmentDescriptor {
    PathRef(String),
    #[serde(rename_all = "camelCase")]
    InlineContent {
        #[serde(default)]
        filename: Option<String>,
        content: String,
        #[serde(default)]
        encoding: Option<String>,
        #[serde(default)]
        content_type: Option<String>,
    },
    PathWithName {
        #[serde(default)]
        filename: Option<String>,
        path: String,
    },
}

/// Where the bytes of a resolved attachment come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum AttachmentSource {
    File {
        path: PathBuf,
    },
    #[serde(rename_all = "camelCase")]
    Inline {
        content: String,
        encoding: String,
        content_type: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedAttachment {
    pub filename: String,
    pub source: AttachmentSource,
}

/// Attachment bytes ready to be placed in a MIME part.
#[derive(Debug, Clone)]
pub struct LoadedAttachment {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// Resolves every descriptor into exactly one attachment, keeping order.
/// Files are not touched here; a missing file only fails at send time.
pub fn normalize(descriptors: &[AttachmentDescriptor]) -> Vec<ResolvedAttachment> {
    descriptors.iter().map(ResolvedAttachment::from_descriptor).collect()
}

fn filename_from_path(path: &str) -> String {
    path.rsplit(['/', '\\'])
        .next()
        .filter(|segment| !segment.is_empty())
        .unwrap_or(DEFAULT_ATTACHMENT_NAME)
        .to_string()
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

impl ResolvedAttachment {
    pub fn from_descriptor(descriptor: &AttachmentDescriptor) -> Self {
        match descriptor {
            AttachmentDescriptor::PathRef(path) => Self {
                filename: filename_from_path(path),
                source: AttachmentSource::File {
                    path: PathBuf::from(path),
                },
            },
            AttachmentDescriptor::InlineContent {
                filename,
                content,
                encoding,
                content_type,
            } => Self {
                filename: non_empty(filename)
                    .unwrap_or(DEFAULT_ATTACHMENT_NAME)
                    .to_string(),
                source: AttachmentSource::Inline {
                    content: content.clone(),
                    encoding: non_empty(encoding).unwrap_or(DEFAULT_ENCODING).to_string(),
                    content_type: non_empty(content_type)
                        .unwrap_or(DEFAULT_CONTENT_TYPE)
                        .to_string(),
                },
            },
            AttachmentDescriptor::PathWithName { filename, path } => Self {
                filename: non_empty(filename)
                    .map(str::to_string)
                    .unwrap_or_else(|| filename_from_path(path)),
                source: AttachmentSource::File {
                    path: PathBuf::from(path),
                },
            },
        }
    }

    pub fn is_inline(&self) -> bool {
        matches!(self.source, AttachmentSource::Inline { .. })
    }

    /// Whether loading this attachment only reads below `root`. Inline
    /// content never touches the filesystem. Paths with `..` segments are
    /// rejected outright rather than resolved.
    pub fn is_within(&self, root: &Path) -> bool {
        match &self.source {
            AttachmentSource::Inline { .. } => true,
            AttachmentSource::File { path } => {
                path.starts_with(root)
                    && !path
                        .components()
                        .any(|component| matches!(component, Component::ParentDir))
            }
        }
    }

    /// Reads or decodes the attachment body.
    pub async fn load(&self) -> Result<LoadedAttachment, EmailError> {
        match &self.source {
            AttachmentSource::File { path } => {
                let data =
                    tokio::fs::read(path)
                        .await
                        .map_err(|source| EmailError::AttachmentRead {
                            path: path.display().to_string(),
                            source,
                        })?;
                Ok(LoadedAttachment {
                    filename: self.filename.clone(),
                    content_type: guess_content_type(&self.filename, path),
                    data,
                })
            }
            AttachmentSource::Inline {
                content,
                encoding,
                content_type,
            } => {
                let data = if encoding.eq_ignore_ascii_case("base64") {
                    // Line breaks are common in pasted base64 payloads
                    let compact: String =
                        content.chars().filter(|c| !c.is_whitespace()).collect();
                    general_purpose::STANDARD.decode(compact).map_err(|e| {
                        EmailError::InvalidAttachment {
                            filename: self.filename.clone(),
                            reason: e.to_string(),
                        }
                    })?
                } else {
                    content.as_bytes().to_vec()
                };
                Ok(LoadedAttachment {
                    filename: self.filename.clone(),
                    content_type: content_type.clone(),
                    data,
                })
            }
        }
    }
}

fn guess_content_type(filename: &str, path: &Path) -> String {
    mime_guess::from_path(filename)
        .first()
        .or_else(|| mime_guess::from_path(path).first())
        .map(|mime| mime.essence_str().to_string())
        .unwrap_or_else(|| "application/octet-stream".to_string())
}

impl From<&ResolvedAttachment> for AttachmentDescriptor {
    fn from(resolved: &ResolvedAttachment) -> Self {
        match &resolved.source {
            AttachmentSource::File { path } => AttachmentDescriptor::PathWithName {
                filename: Some(resolved.filename.clone()),
                path: path.display().to_string(),
            },
            AttachmentSource::Inline {
                content,
                encoding,
                content_type,
            } => AttachmentDescriptor::InlineContent {
                filename: Some(resolved.filename.clone()),
                content: content.clone(),
                encoding: Some(encoding.clone()),
                content_type: Some(content_type.clone()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: serde_json::Value) -> Vec<AttachmentDescriptor> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_bare_path_normalizes_to_file_ref() {
        let resolved = normalize(&[AttachmentDescriptor::PathRef("./report.pdf".to_string())]);
        assert_eq!(
            resolved,
            vec![ResolvedAttachment {
                filename: "report.pdf".to_string(),
                source: AttachmentSource::File {
                    path: PathBuf::from("./report.pdf"),
                },
            }]
        );
    }

    #[test]
    fn test_wire_shapes_are_classified() {
        let descriptors = parse(json!([
            "docs/invoice.pdf",
            {"filename": "notes.txt", "content": "aGVsbG8=", "encoding": "base64", "contentType": "text/plain"},
            {"filename": "contract.pdf", "path": "/srv/files/c-123.pdf"},
            {"path": "/srv/files/terms.pdf"}
        ]));

        assert!(matches!(descriptors[0], AttachmentDescriptor::PathRef(_)));
        assert!(matches!(descriptors[1], AttachmentDescriptor::InlineContent { .. }));
        assert!(matches!(descriptors[2], AttachmentDescriptor::PathWithName { .. }));
        assert!(matches!(descriptors[3], AttachmentDescriptor::PathWithName { .. }));

        let resolved = normalize(&descriptors);
        let names: Vec<_> = resolved.iter().map(|a| a.filename.as_str()).collect();
        assert_eq!(names, ["invoice.pdf", "notes.txt", "contract.pdf", "terms.pdf"]);
        assert!(resolved[1].is_inline());
        assert!(!resolved[3].is_inline());
    }

    #[test]
    fn test_content_wins_over_path() {
        let descriptors = parse(json!([
            {"filename": "a.pdf", "content": "JVBERi0=", "path": "/ignored.pdf"}
        ]));
        assert!(matches!(descriptors[0], AttachmentDescriptor::InlineContent { .. }));
    }

    #[test]
    fn test_inline_defaults() {
        let descriptors = parse(json!([{ "content": "JVBERi0=" }]));
        let resolved = normalize(&descriptors);
        assert_eq!(resolved[0].filename, DEFAULT_ATTACHMENT_NAME);
        assert_eq!(
            resolved[0].source,
            AttachmentSource::Inline {
                content: "JVBERi0=".to_string(),
                encoding: "base64".to_string(),
                content_type: "application/pdf".to_string(),
            }
        );
    }

    #[test]
    fn test_path_without_file_segment_uses_default_name() {
        let resolved = normalize(&[AttachmentDescriptor::PathRef("uploads/".to_string())]);
        assert_eq!(resolved[0].filename, DEFAULT_ATTACHMENT_NAME);
    }

    #[test]
    fn test_attachment_root_confines_file_paths() {
        let root = Path::new("/srv/mailroom/files");
        let resolved = normalize(&parse(json!([
            "/srv/mailroom/files/invoices/2024-01.pdf",
            "/etc/passwd",
            "/srv/mailroom/files/../../../etc/shadow",
            "/srv/mailroom/files-other/report.pdf",
            {"filename": "notes.txt", "content": "aGVsbG8="}
        ])));

        let allowed: Vec<bool> = resolved.iter().map(|a| a.is_within(root)).collect();
        assert_eq!(allowed, [true, false, false, false, true]);
    }

    #[test]
    fn test_empty_input() {
        assert!(normalize(&[]).is_empty());
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let descriptors = parse(json!([
            "./report.pdf",
            {"filename": "notes.txt", "content": "hello", "encoding": "utf8", "contentType": "text/plain"},
            {"filename": "contract.pdf", "path": "/srv/files/c-123.pdf"}
        ]));
        let once = normalize(&descriptors);
        let round: Vec<AttachmentDescriptor> = once.iter().map(AttachmentDescriptor::from).collect();
        let twice = normalize(&round);
        assert_eq!(once, twice);
    }

    #[tokio::test]
    async fn test_load_inline_base64() {
        let attachment = ResolvedAttachment {
            filename: "hello.txt".to_string(),
            source: AttachmentSource::Inline {
                content: "aGVs\nbG8=".to_string(),
                encoding: "base64".to_string(),
                content_type: "text/plain".to_string(),
            },
        };
        let loaded = attachment.load().await.unwrap();
        assert_eq!(loaded.data, b"hello");
        assert_eq!(loaded.content_type, "text/plain");
    }

    #[tokio::test]
    async fn test_load_inline_raw_encoding() {
        let attachment = ResolvedAttachment {
            filename: "hello.txt".to_string(),
            source: AttachmentSource::Inline {
                content: "plain text".to_string(),
                encoding: "utf8".to_string(),
                content_type: "text/plain".to_string(),
            },
        };
        let loaded = attachment.load().await.unwrap();
        assert_eq!(loaded.data, b"plain text");
    }

    #[tokio::test]
    async fn test_load_invalid_base64() {
        let attachment = ResolvedAttachment {
            filename: "broken.pdf".to_string(),
            source: AttachmentSource::Inline {
                content: "not base64!!".to_string(),
                encoding: "base64".to_string(),
                content_type: "application/pdf".to_string(),
            },
        };
        let err = attachment.load().await.unwrap_err();
        assert!(matches!(err, EmailError::InvalidAttachment { .. }));
    }

    #[tokio::test]
    async fn test_load_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("report.csv");
        std::fs::write(&path, "a,b\n1,2\n").unwrap();

        let resolved = normalize(&[AttachmentDescriptor::PathRef(
            path.display().to_string(),
        )]);
        let loaded = resolved[0].load().await.unwrap();
        assert_eq!(loaded.filename, "report.csv");
        assert_eq!(loaded.content_type, "text/csv");
        assert_eq!(loaded.data, b"a,b\n1,2\n");
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let resolved = normalize(&[AttachmentDescriptor::PathRef(
            "/definitely/not/here.pdf".to_string(),
        )]);
        let err = resolved[0].load().await.unwrap_err();
        assert!(matches!(err, EmailError::AttachmentRead { .. }));
    }
}
