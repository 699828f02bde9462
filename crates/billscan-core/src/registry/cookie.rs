//! Cookie header scanning.

/// Find a named cookie's value in a raw `Set-Cookie` or `Cookie` header.
///
/// The header is split into `;`-delimited pairs and the first pair whose
/// trimmed name equals `name` exactly wins. Attributes such as `Path` or
/// `HttpOnly` never match a cookie name by accident, and a pair with an
/// empty value counts as absent.
pub fn find_cookie(raw: &str, name: &str) -> Option<String> {
    raw.split(';')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| key.trim() == name)
        .map(|(_, value)| value.trim().trim_matches('"').to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_cookie_first_pair() {
        let raw = "CaptchaCookie=3f9a1c; Path=/services; Secure; HttpOnly";
        assert_eq!(find_cookie(raw, "CaptchaCookie"), Some("3f9a1c".to_string()));
    }

    #[test]
    fn test_find_cookie_among_pairs() {
        let raw = "JSESSIONID=abc; CaptchaCookie=\"tok=en\"; Path=/";
        assert_eq!(find_cookie(raw, "CaptchaCookie"), Some("tok=en".to_string()));
        assert_eq!(find_cookie(raw, "JSESSIONID"), Some("abc".to_string()));
    }

    #[test]
    fn test_find_cookie_exact_name() {
        let raw = "XCaptchaCookie=wrong; CaptchaCookieOld=stale";
        assert_eq!(find_cookie(raw, "CaptchaCookie"), None);
    }

    #[test]
    fn test_find_cookie_absent() {
        assert_eq!(find_cookie("", "CaptchaCookie"), None);
        assert_eq!(find_cookie("Path=/; HttpOnly", "CaptchaCookie"), None);
        assert_eq!(find_cookie("CaptchaCookie=; Path=/", "CaptchaCookie"), None);
    }
}
