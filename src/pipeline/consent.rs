//! Consent tracking: records opt-in/opt-out keywords on stored phone numbers.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use crate::error::DatabaseError;
use crate::pipeline::keywords::{ConsentKeyword, classify};
use crate::pipeline::types::{IncomingMessage, PhoneNumberRecord, clean_number};
use crate::store::Database;

/// Updates messaging consent for the sender of a keyword message.
pub struct ConsentTracker {
    store: Arc<dyn Database>,
}

impl ConsentTracker {
    pub fn new(store: Arc<dyn Database>) -> Self {
        Self { store }
    }

    /// Apply the message's consent keyword (if any) to every phone record of
    /// the sender. Runs at most once per message instance and never when
    /// tracking is disabled for the receiving number.
    ///
    /// Returns the number of records changed.
    pub async fn track(&self, message: &mut IncomingMessage) -> Result<usize, DatabaseError> {
        if message.was_opt_in_out_tracking_processed || message.disable_sms_opt_in_out_tracking {
            return Ok(0);
        }

        let changed = match classify(message.body.as_deref()) {
            Some(keyword) => self.apply(&message.from_number, keyword).await?,
            None => 0,
        };

        message.was_opt_in_out_tracking_processed = true;
        Ok(changed)
    }

    async fn apply(&self, from_number: &str, keyword: ConsentKeyword) -> Result<usize, DatabaseError> {
        let cleaned = clean_number(from_number);
        if cleaned.is_empty() {
            return Ok(0);
        }

        let records = self.store.find_phone_numbers(&cleaned).await?;
        let mut changed = 0;
        for mut record in records {
            if !set_consent(&mut record, keyword) {
                continue;
            }
            self.store.update_phone_consent(&record).await?;
            changed += 1;
        }

        if changed > 0 {
            info!(
                from = %cleaned,
                keyword = keyword.action_name(),
                records = changed,
                "Messaging consent updated"
            );
        } else {
            debug!(from = %cleaned, keyword = keyword.action_name(), "No phone records changed");
        }
        Ok(changed)
    }
}

/// Set the consent flags on a record. Returns whether anything changed.
fn set_consent(record: &mut PhoneNumberRecord, keyword: ConsentKeyword) -> bool {
    match keyword {
        ConsentKeyword::OptOut => {
            if !record.is_messaging_enabled && record.is_messaging_opted_out {
                return false;
            }
            record.is_messaging_enabled = false;
            record.is_messaging_opted_out = true;
            record.messaging_opted_out_at = Some(Utc::now());
        }
        ConsentKeyword::OptIn => {
            if record.is_messaging_enabled && !record.is_messaging_opted_out {
                return false;
            }
            record.is_messaging_enabled = true;
            record.is_messaging_opted_out = false;
            record.messaging_opted_out_at = None;
        }
    }
    true
}
