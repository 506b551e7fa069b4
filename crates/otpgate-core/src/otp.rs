//! One-time-password generation and message templating.

use rand::Rng;

/// Default number of digits in a generated code.
pub const DEFAULT_OTP_LENGTH: usize = 6;

/// Bounds accepted from callers; anything outside is clamped.
const MIN_OTP_LENGTH: usize = 4;
const MAX_OTP_LENGTH: usize = 10;

/// Placeholder replaced by the generated code in custom message templates.
pub const OTP_PLACEHOLDER: &str = "{otp}";

const DEFAULT_TEMPLATE: &str =
    "Your verification code is: *{otp}*\n\nThis code expires in 10 minutes.";

/// Generate a random numeric code of `length` digits.
pub fn generate_otp(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}

/// Clamp a caller-supplied length into the accepted range.
pub fn sanitize_length(requested: Option<u64>) -> usize {
    match requested {
        Some(n) => (n as usize).clamp(MIN_OTP_LENGTH, MAX_OTP_LENGTH),
        None => DEFAULT_OTP_LENGTH,
    }
}

/// Render the outbound message body for a code.
///
/// A custom template may carry an `{otp}` placeholder; without one the code
/// is not injected (the caller asked for fixed text). No template falls back
/// to the default announcement.
pub fn render_message(template: Option<&str>, code: &str) -> String {
    match template {
        Some(t) => t.replace(OTP_PLACEHOLDER, code),
        None => DEFAULT_TEMPLATE.replace(OTP_PLACEHOLDER, code),
    }
}
