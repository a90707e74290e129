//! `multipart/form-data` fields and attachments.
//!
//! Files named by path are read only when the request is dispatched.

use std::path::PathBuf;

use bytes::{BufMut, Bytes, BytesMut};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::media;

/// Filename and content type of an attachment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttachOptions {
    pub filename: Option<String>,
    pub content_type: Option<String>,
}

impl AttachOptions {
    pub fn filename(filename: impl Into<String>) -> Self {
        Self {
            filename: Some(filename.into()),
            content_type: None,
        }
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

impl From<&str> for AttachOptions {
    fn from(filename: &str) -> Self {
        AttachOptions::filename(filename)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum PartSource {
    Field(String),
    Bytes(Bytes),
    File(PathBuf),
}

#[derive(Debug, Clone, PartialEq)]
struct Part {
    name: String,
    source: PartSource,
    options: AttachOptions,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Multipart {
    parts: Vec<Part>,
}

/// Encoded body plus the `Content-Type` header naming its boundary.
#[derive(Debug, Clone)]
pub struct EncodedForm {
    pub content_type: String,
    pub body: Bytes,
}

impl Multipart {
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn field(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.parts.push(Part {
            name: name.into(),
            source: PartSource::Field(value.into()),
            options: AttachOptions::default(),
        });
    }

    pub fn bytes(&mut self, name: impl Into<String>, data: Bytes, options: AttachOptions) {
        self.parts.push(Part {
            name: name.into(),
            source: PartSource::Bytes(data),
            options,
        });
    }

    /// The filename defaults to the last path component.
    pub fn file(&mut self, name: impl Into<String>, path: impl Into<PathBuf>, mut options: AttachOptions) {
        let path = path.into();
        if options.filename.is_none() {
            options.filename = path
                .file_name()
                .map(|file_name| file_name.to_string_lossy().into_owned());
        }
        self.parts.push(Part {
            name: name.into(),
            source: PartSource::File(path),
            options,
        });
    }

    pub async fn encode(&self) -> Result<EncodedForm> {
        self.encode_with_boundary(&format!("errand{}", Uuid::new_v4().simple()))
            .await
    }

    pub(crate) async fn encode_with_boundary(&self, boundary: &str) -> Result<EncodedForm> {
        let mut body = BytesMut::new();
        for part in &self.parts {
            body.put_slice(format!("--{boundary}\r\n").as_bytes());
            let name = escape(&part.name);
            match &part.source {
                PartSource::Field(value) => {
                    body.put_slice(
                        format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                    );
                    body.put_slice(value.as_bytes());
                }
                PartSource::Bytes(data) => {
                    put_file_head(&mut body, &name, &part.options);
                    body.put_slice(data);
                }
                PartSource::File(path) => {
                    let data = tokio::fs::read(path).await.map_err(|e| {
                        Error::InvalidRequest(format!("cannot read attachment {}: {e}", path.display()))
                    })?;
                    put_file_head(&mut body, &name, &part.options);
                    body.put_slice(&data);
                }
            }
            body.put_slice(b"\r\n");
        }
        body.put_slice(format!("--{boundary}--\r\n").as_bytes());
        Ok(EncodedForm {
            content_type: format!("multipart/form-data; boundary={boundary}"),
            body: body.freeze(),
        })
    }
}

fn put_file_head(body: &mut BytesMut, name: &str, options: &AttachOptions) {
    let filename = options.filename.as_deref().unwrap_or("blob");
    let content_type = options
        .content_type
        .clone()
        .unwrap_or_else(|| media::guess_from_filename(filename).to_string());
    body.put_slice(
        format!(
            "Content-Disposition: form-data; name=\"{name}\"; filename=\"{}\"\r\nContent-Type: {content_type}\r\n\r\n",
            escape(filename)
        )
        .as_bytes(),
    );
}

fn escape(value: &str) -> String {
    value.replace('"', "%22").replace('\r', "%0D").replace('\n', "%0A")
}
