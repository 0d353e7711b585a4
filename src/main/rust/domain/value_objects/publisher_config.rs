use crate::domain::errors::{DomainError, Result};

/// Inputs the publisher needs from the command line
#[derive(Debug, Clone, PartialEq)]
pub struct PublisherConfig {
    pipeline_description: String,
    endpoint: String,
    credential: String,
}

impl PublisherConfig {
    pub fn new(pipeline_description: String, endpoint: String, credential: String) -> Result<Self> {
        Self::validate_description(&pipeline_description)?;
        Self::validate_endpoint(&endpoint)?;
        Self::validate_credential(&credential)?;

        Ok(Self {
            pipeline_description,
            endpoint,
            credential,
        })
    }

    /// Builds the description from gst-launch style tokens
    pub fn from_launch_args(
        args: &[String],
        endpoint: String,
        credential: String,
    ) -> Result<Self> {
        Self::new(args.join(" "), endpoint, credential)
    }

    pub fn pipeline_description(&self) -> &str {
        &self.pipeline_description
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn credential(&self) -> &str {
        &self.credential
    }

    fn validate_description(description: &str) -> Result<()> {
        if description.trim().is_empty() {
            return Err(DomainError::EmptyPipelineDescription);
        }
        Ok(())
    }

    pub(crate) fn validate_endpoint(url: &str) -> Result<()> {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(DomainError::InvalidEndpoint(url.to_string()));
        }
        Ok(())
    }

    fn validate_credential(credential: &str) -> Result<()> {
        if credential.trim().is_empty() {
            return Err(DomainError::EmptyCredential);
        }
        Ok(())
    }
}
