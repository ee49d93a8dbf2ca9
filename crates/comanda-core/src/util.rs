/// Reduce a phone number or WhatsApp chat id to its digits.
///
/// Example: `"+55 (11) 99999-0000"` → `"5511999990000"`,
/// `"5511999990000@c.us"` → `"5511999990000"`
pub fn normalize_phone(raw: &str) -> String {
    let number = raw.split('@').next().unwrap_or(raw);
    number.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Build the WhatsApp chat id for a direct conversation with `phone`.
pub fn chat_id_for(phone: &str) -> String {
    format!("{}@c.us", normalize_phone(phone))
}

/// Group chats use the `@g.us` suffix; the bot never answers those.
pub fn is_group_chat(chat_id: &str) -> bool {
    chat_id.ends_with("@g.us")
}

/// Format an amount in cents as a decimal string, e.g. `1250` → `"12.50"`.
pub fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_phone() {
        assert_eq!(normalize_phone("+55 (11) 99999-0000"), "5511999990000");
        assert_eq!(normalize_phone("5511999990000@c.us"), "5511999990000");
        assert_eq!(normalize_phone(""), "");
    }

    #[test]
    fn test_chat_id_roundtrip() {
        assert_eq!(chat_id_for("+1 555 0100"), "15550100@c.us");
        assert_eq!(normalize_phone(&chat_id_for("15550100")), "15550100");
    }

    #[test]
    fn test_is_group_chat() {
        assert!(is_group_chat("120363025@g.us"));
        assert!(!is_group_chat("15550100@c.us"));
    }

    #[test]
    fn test_format_cents() {
        assert_eq!(format_cents(1250), "12.50");
        assert_eq!(format_cents(5), "0.05");
        assert_eq!(format_cents(-199), "-1.99");
        assert_eq!(format_cents(0), "0.00");
    }
}
