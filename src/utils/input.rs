use crate::error::{AppError, AppResult};
use regex::Regex;

/// 优惠码统一大写存储，匹配时忽略大小写
pub fn normalize_coupon_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

pub fn validate_coupon_code(code: &str) -> AppResult<()> {
    let re = Regex::new(r"^[A-Z0-9][A-Z0-9_-]{2,63}$").unwrap();
    if !re.is_match(code) {
        return Err(AppError::ValidationError(
            "Coupon codes may only contain letters, digits, '-' and '_' (3-64 characters)"
                .to_string(),
        ));
    }
    Ok(())
}

pub fn validate_slug(slug: &str) -> AppResult<()> {
    let re = Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").unwrap();
    if !re.is_match(slug) {
        return Err(AppError::ValidationError(
            "Slug must be lowercase letters and digits separated by single dashes".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_coupon_code() {
        assert_eq!(normalize_coupon_code("  save20 "), "SAVE20");
    }

    #[test]
    fn test_validate_coupon_code() {
        assert!(validate_coupon_code("SAVE20").is_ok());
        assert!(validate_coupon_code("BLACK-FRIDAY_24").is_ok());
        assert!(validate_coupon_code("AB").is_err());
        assert!(validate_coupon_code("SAVE 20").is_err());
        assert!(validate_coupon_code("-SAVE").is_err());
    }

    #[test]
    fn test_validate_slug() {
        assert!(validate_slug("ebook-starter-kit").is_ok());
        assert!(validate_slug("Ebook").is_err());
        assert!(validate_slug("double--dash").is_err());
        assert!(validate_slug("trailing-").is_err());
    }
}
