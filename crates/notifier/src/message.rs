//! Transport-neutral rendered mail message.

use serde::{Deserialize, Serialize};

/// Call-to-action button rendered below the intro lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailAction {
    pub label: String,
    pub url: String,
}

/// A rendered message ready to hand to a `MailTransport`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailMessage {
    pub to_address: String,
    pub to_name: String,
    pub subject: String,
    pub greeting: String,
    /// Lines shown before the action.
    pub intro: Vec<String>,
    pub action: Option<MailAction>,
    /// Lines shown after the action.
    pub outro: Vec<String>,
}

impl MailMessage {
    /// Plain-text body: greeting, intro, action, outro, separated by blank lines.
    pub fn text_body(&self) -> String {
        let mut sections = vec![self.greeting.clone()];
        sections.extend(self.intro.iter().cloned());
        if let Some(action) = &self.action {
            sections.push(format!("{}: {}", action.label, action.url));
        }
        sections.extend(self.outro.iter().cloned());
        sections.join("\n\n")
    }

    /// `Name <address>` when a name is known, the bare address otherwise.
    pub fn recipient(&self) -> String {
        if self.to_name.trim().is_empty() {
            self.to_address.clone()
        } else {
            format!("{} <{}>", self.to_name, self.to_address)
        }
    }
}
