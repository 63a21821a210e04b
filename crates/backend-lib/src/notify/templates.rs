//! Message texts.
use concern_common::IssueStatus;

/// A rendered message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub subject: String,
    pub body: String,
}

pub fn verification_email(name: &str, code: &str, ttl_minutes: i64) -> Rendered {
    Rendered {
        subject: "Verify your email address".to_string(),
        body: format!(
            "Hello {name},\n\n\
             Your verification code is {code}. It expires in {ttl_minutes} minutes.\n\n\
             If you did not create an account, ignore this message."
        ),
    }
}

pub fn reset_email(name: &str, link: &str, ttl_minutes: i64) -> Rendered {
    Rendered {
        subject: "Password reset request".to_string(),
        body: format!(
            "Hello {name},\n\n\
             Use the link below to choose a new password. It expires in {ttl_minutes} minutes \
             and works once.\n\n{link}\n\n\
             If you did not ask for a reset, ignore this message."
        ),
    }
}

pub fn reset_sms(link: &str) -> Rendered {
    Rendered {
        subject: "Password reset".to_string(),
        body: format!("Reset your portal password: {link}"),
    }
}

pub fn status_update_email(
    name: &str,
    issue_subject: &str,
    status: IssueStatus,
    response: &str,
) -> Rendered {
    let status = match status {
        IssueStatus::Pending => "pending",
        IssueStatus::InProgress => "in progress",
        IssueStatus::Resolved => "resolved",
        IssueStatus::Deleted => "closed",
    };
    let mut body = format!("Hello {name},\n\nYour issue \"{issue_subject}\" is now {status}.");
    if !response.is_empty() {
        body.push_str(&format!("\n\nResponse from the administration:\n{response}"));
    }
    Rendered {
        subject: format!("Update on your issue: {issue_subject}"),
        body,
    }
}
