//! Phone-number normalization for the chat network's JID addressing.

/// Suffix the network uses for individual accounts.
pub const JID_SUFFIX: &str = "@s.whatsapp.net";

/// Strip a phone number down to its digits.
///
/// Everything except digits is dropped; a leading `+` is accepted and
/// removed (numbers are addressed in full international form without it).
pub fn normalize(number: &str) -> String {
    number.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Format a phone number as a network JID.
pub fn to_jid(number: &str) -> String {
    format!("{}{JID_SUFFIX}", normalize(number))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_formatting() {
        assert_eq!(normalize("+33 6 12 34 56 78"), "33612345678");
        assert_eq!(normalize("(555) 123-4567"), "5551234567");
        assert_eq!(normalize("33612345678"), "33612345678");
    }

    #[test]
    fn to_jid_appends_suffix() {
        assert_eq!(to_jid("+33612345678"), "33612345678@s.whatsapp.net");
    }

    #[test]
    fn normalize_empty_input() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("abc"), "");
    }
}
