use url::Url;
use validator::ValidationError;

/// Validates that a string is an absolute http(s) URL.
pub fn validate_url_string(url: &str) -> Result<(), ValidationError> {
    match Url::parse(url) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Ok(()),
        _ => Err(ValidationError::new("invalid_url")),
    }
}

/// Non-empty list of non-blank strings, each at most 500 bytes.
pub fn validate_string_list(items: &[String]) -> Result<(), ValidationError> {
    if items.is_empty() {
        return Err(ValidationError::new("list_cannot_be_empty"));
    }
    for item in items {
        if item.trim().is_empty() {
            return Err(ValidationError::new("blank_item"));
        }
        if item.len() > 500 {
            return Err(ValidationError::new("item_too_long"));
        }
    }
    Ok(())
}

/// Tags may be empty, but each tag must be short and non-blank.
pub fn validate_tags(tags: &[String]) -> Result<(), ValidationError> {
    if tags.len() > 20 {
        return Err(ValidationError::new("too_many_tags"));
    }
    if tags.iter().any(|t| t.trim().is_empty() || t.len() > 40) {
        return Err(ValidationError::new("invalid_tag"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls() {
        assert!(validate_url_string("https://cdn.example.com/a.pdf").is_ok());
        assert!(validate_url_string("ftp://example.com/a.pdf").is_err());
        assert!(validate_url_string("not a url").is_err());
    }

    #[test]
    fn string_lists() {
        assert!(validate_string_list(&["A".into(), "B".into()]).is_ok());
        assert!(validate_string_list(&[]).is_err());
        assert!(validate_string_list(&["  ".into()]).is_err());
    }

    #[test]
    fn tags() {
        assert!(validate_tags(&[]).is_ok());
        assert!(validate_tags(&["polity".into()]).is_ok());
        assert!(validate_tags(&["".into()]).is_err());
    }
}
