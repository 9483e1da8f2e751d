//! Opt-in/opt-out keyword classification.
//!
//! Carrier rules treat a handful of single-word replies as consent changes.
//! Only a body that is exactly one keyword counts; "please STOP spamming me"
//! is an ordinary message.

/// Keywords that withdraw messaging consent.
pub const OPT_OUT_KEYWORDS: &[&str] = &[
    "STOP",
    "STOPALL",
    "UNSUBSCRIBE",
    "CANCEL",
    "END",
    "QUIT",
    "REVOKE",
    "OPTOUT",
];

/// Keywords that grant messaging consent.
pub const OPT_IN_KEYWORDS: &[&str] = &["START", "YES", "UNSTOP"];

/// Which way a consent keyword points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsentKeyword {
    OptOut,
    OptIn,
}

impl ConsentKeyword {
    /// Name used for the synthesized outcome.
    pub fn action_name(&self) -> &'static str {
        match self {
            Self::OptOut => "SMS Opt-Out",
            Self::OptIn => "SMS Opt-In",
        }
    }
}

fn matches_any(body: Option<&str>, keywords: &[&str]) -> bool {
    let Some(body) = body else {
        return false;
    };
    let trimmed = body.trim();
    !trimmed.is_empty() && keywords.iter().any(|k| k.eq_ignore_ascii_case(trimmed))
}

/// True when the whole trimmed body is an opt-out keyword.
pub fn is_opt_out_message(body: Option<&str>) -> bool {
    matches_any(body, OPT_OUT_KEYWORDS)
}

/// True when the whole trimmed body is an opt-in keyword.
pub fn is_opt_in_message(body: Option<&str>) -> bool {
    matches_any(body, OPT_IN_KEYWORDS)
}

pub fn classify(body: Option<&str>) -> Option<ConsentKeyword> {
    if is_opt_out_message(body) {
        Some(ConsentKeyword::OptOut)
    } else if is_opt_in_message(body) {
        Some(ConsentKeyword::OptIn)
    } else {
        None
    }
}
