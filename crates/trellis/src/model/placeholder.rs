//! Placeholder content shown instead of items.

use trellis_core::LoadFailure;

/// Title, message and image shown by an empty or error placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PlaceholderContent {
    /// Headline text.
    pub title: Option<String>,
    /// Explanatory text.
    pub message: Option<String>,
    /// Name of an image asset.
    pub image: Option<String>,
}

impl PlaceholderContent {
    /// Creates empty placeholder content.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Sets the message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Sets the image name.
    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }
}

/// What a data source displays instead of its items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placeholder {
    /// Content is loading; show an activity indicator.
    Loading,
    /// The load produced no items.
    NoContent(PlaceholderContent),
    /// The load failed. When no error message is configured, the content's
    /// message is the failure reason.
    Error {
        /// What to display.
        content: PlaceholderContent,
        /// Why the load failed.
        failure: LoadFailure,
    },
}

impl Placeholder {
    pub(crate) fn error(configured: &PlaceholderContent, failure: &LoadFailure) -> Self {
        let mut content = configured.clone();
        if content.message.is_none() {
            content.message = Some(failure.reason().to_string());
        }
        Self::Error {
            content,
            failure: failure.clone(),
        }
    }

    /// The content to display, if any.
    pub fn content(&self) -> Option<&PlaceholderContent> {
        match self {
            Self::Loading => None,
            Self::NoContent(content) | Self::Error { content, .. } => Some(content),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_placeholder_falls_back_to_reason() {
        let placeholder = Placeholder::error(
            &PlaceholderContent::new().with_title("Unable to load"),
            &LoadFailure::new("network unreachable"),
        );
        let content = placeholder.content().unwrap();
        assert_eq!(content.title.as_deref(), Some("Unable to load"));
        assert_eq!(content.message.as_deref(), Some("network unreachable"));
    }

    #[test]
    fn test_configured_error_message_wins() {
        let placeholder = Placeholder::error(
            &PlaceholderContent::new().with_message("Try again later"),
            &LoadFailure::new("500"),
        );
        assert_eq!(
            placeholder.content().and_then(|c| c.message.as_deref()),
            Some("Try again later")
        );
        assert!(Placeholder::Loading.content().is_none());
    }
}
