//! Attachment presence check.
//!
//! Not registered with the dispatcher; callers that fetch attachment
//! metadata from the host can use it to gate a send on a real attachment.

use super::{BlockNotice, Outcome};
use crate::host::AttachmentDetails;

const ATTACH_TIP: &str = "**Tip**: For guidance on how to attach a file, see [Attach files in Outlook](https://www.contoso.com/help/attach-files-in-outlook).";

const INLINE_ONLY: &str = "Looks like the body of your message includes an image or an inline file. Attach a copy to the message before sending.";

const MISSING: &str = "Looks like you're forgetting to include an attachment.";

fn tip_notice(message: &str) -> BlockNotice {
    BlockNotice {
        message: message.to_owned(),
        markdown: Some(format!("{}\n\n{}", message, ATTACH_TIP)),
        ..BlockNotice::default()
    }
}

/// Allow when at least one attachment is a regular (non-inline) file.
pub fn classify_attachments(attachments: &[AttachmentDetails]) -> Outcome {
    if attachments.iter().any(|a| !a.is_inline) {
        return Outcome::Allow;
    }
    if attachments.is_empty() {
        Outcome::Block(tip_notice(MISSING))
    } else {
        Outcome::Block(tip_notice(INLINE_ONLY))
    }
}
