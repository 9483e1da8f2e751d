//! Confirmation texts sent after a consent keyword.

use crate::config::OrganizationConfig;
use crate::pipeline::keywords::ConsentKeyword;

/// Build the confirmation for a consent change.
pub fn consent_confirmation(keyword: ConsentKeyword, org: &OrganizationConfig) -> String {
    match keyword {
        ConsentKeyword::OptOut => opt_out_confirmation(org),
        ConsentKeyword::OptIn => opt_in_confirmation(org),
    }
}

pub fn opt_out_confirmation(org: &OrganizationConfig) -> String {
    let mut text = format!(
        "You are unsubscribed from {} messages. No more messages will be sent. Reply HELP for help",
        org.name
    );
    match org.contact() {
        Some(contact) => {
            text.push_str(" or contact us at ");
            text.push_str(contact);
            text.push('.');
        }
        None => text.push('.'),
    }
    text
}

pub fn opt_in_confirmation(org: &OrganizationConfig) -> String {
    format!(
        "You are now subscribed to {} messages. Message and data rates may apply. \
         Reply STOP to unsubscribe or HELP for help.",
        org.name
    )
}
