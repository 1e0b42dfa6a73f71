//! Human-readable notification templates for fulfillment events.

/// The facts one conversation produced, rendered into a notification.
#[derive(Debug, Clone, Default)]
pub struct FulfillmentEvent {
    pub conversation_id: String,
    pub user_name: String,
    pub offer_title: Option<String>,
    /// Set on a successful allocation.
    pub code: Option<String>,
    /// Set when anything in the pipeline went wrong (or was anomalous).
    pub error: Option<String>,
}

impl FulfillmentEvent {
    pub fn new(conversation_id: impl Into<String>, user_name: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            user_name: user_name.into(),
            ..Self::default()
        }
    }

    pub fn with_offer(mut self, offer_title: impl Into<String>) -> Self {
        self.offer_title = Some(offer_title.into());
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Classification tags for the dispatcher. Errors win over sales.
    pub fn tags(&self) -> Vec<&'static str> {
        if self.error.is_some() {
            vec!["marketplace", "error"]
        } else if self.code.is_some() {
            vec!["marketplace", "sale"]
        } else {
            vec!["marketplace", "conversation"]
        }
    }

    /// Multi-line human-readable message.
    pub fn render(&self) -> String {
        if let Some(error) = &self.error {
            let mut out = format!(
                "Marketplace fulfillment error\nFrom: {}\nError: {}\nConversation: {}",
                self.user_name, error, self.conversation_id
            );
            if let Some(title) = &self.offer_title {
                out.push_str(&format!("\nOffer: {title}"));
            }
            return out;
        }

        if let Some(code) = &self.code {
            return format!(
                "New sale on the marketplace\nFrom: {}\nOffer: {}\nCode: {}\nConversation: {}",
                self.user_name,
                self.offer_title.as_deref().unwrap_or("-"),
                code,
                self.conversation_id
            );
        }

        let mut out = format!(
            "New marketplace conversation\nFrom: {}\nConversation: {}",
            self.user_name, self.conversation_id
        );
        if let Some(title) = &self.offer_title {
            out.push_str(&format!("\nOffer: {title}"));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_event_renders_reason_and_tags() {
        let event = FulfillmentEvent::new("conv-1", "buyer")
            .with_offer("Steam Key 10")
            .with_error("no code offer found");
        let text = event.render();
        assert!(text.contains("no code offer found"));
        assert!(text.contains("Steam Key 10"));
        assert_eq!(event.tags(), vec!["marketplace", "error"]);
    }

    #[test]
    fn sale_event_renders_code() {
        let event = FulfillmentEvent::new("conv-1", "buyer")
            .with_offer("Steam Key 10")
            .with_code("ABC-123");
        let text = event.render();
        assert!(text.contains("ABC-123"));
        assert_eq!(event.tags(), vec!["marketplace", "sale"]);
    }

    #[test]
    fn plain_conversation_event() {
        let event = FulfillmentEvent::new("conv-1", "buyer");
        assert!(event.render().starts_with("New marketplace conversation"));
        assert_eq!(event.tags(), vec!["marketplace", "conversation"]);
    }

    #[test]
    fn error_outranks_code_in_tags() {
        let event = FulfillmentEvent::new("conv-1", "buyer")
            .with_code("ABC-123")
            .with_error("send failed");
        assert_eq!(event.tags(), vec!["marketplace", "error"]);
    }
}
