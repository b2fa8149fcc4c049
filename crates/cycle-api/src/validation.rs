//! Request validation. Each function returns the first failing rule as
//! [`ApiError::Validation`].

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use uuid::Uuid;

use cycle_types::api::{PageQuery, ResetPasswordRequest, SignUpRequest, VerifyTokenRequest};
use cycle_types::models::Category;

use crate::error::{ApiError, ApiResult};
use crate::form::{FormFile, UploadForm};

pub const MAX_PRODUCT_IMAGES: usize = 5;
pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("email regex compiles")
});

const PASSWORD_SPECIALS: &str = "!@#$%^&*";

fn invalid(message: &str) -> ApiError {
    ApiError::Validation(message.to_string())
}

/// Trimmed, non-empty value or `message`.
pub fn required(value: Option<String>, message: &str) -> ApiResult<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| invalid(message))
}

/// Emails are compared case-insensitively, so they are stored lowercased.
pub fn email(value: Option<String>) -> ApiResult<String> {
    let email = required(value, "Email is missing!")?.to_lowercase();
    if !EMAIL_RE.is_match(&email) {
        return Err(invalid("Invalid email!"));
    }
    Ok(email)
}

pub fn password(value: Option<String>) -> ApiResult<String> {
    let password = value.filter(|p| !p.is_empty()).ok_or_else(|| invalid("Password is missing!"))?;

    if password.chars().count() < 8 {
        return Err(invalid("Password should be at least 8 chars long!"));
    }

    let allowed = password
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || PASSWORD_SPECIALS.contains(c));
    let has_letter = password.chars().any(|c| c.is_ascii_alphabetic());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_special = password.chars().any(|c| PASSWORD_SPECIALS.contains(c));

    if !(allowed && has_letter && has_digit && has_special) {
        return Err(invalid("Password is too simple."));
    }
    Ok(password)
}

pub fn id(value: &str, message: &str) -> ApiResult<Uuid> {
    value.trim().parse().map_err(|_| invalid(message))
}

#[derive(Debug)]
pub struct SignUpInput {
    pub name: String,
    pub email: String,
    pub password: String,
}

pub fn sign_up(req: SignUpRequest) -> ApiResult<SignUpInput> {
    Ok(SignUpInput {
        name: required(req.name, "Name is missing!")?,
        email: email(req.email)?,
        password: password(req.password)?,
    })
}

/// `{id, token}` of a mailed link.
pub fn token_and_id(req: VerifyTokenRequest) -> ApiResult<(Uuid, String)> {
    let owner = id(req.id.as_deref().unwrap_or_default(), "Invalid user id!")?;
    let token = required(req.token, "Token is missing!")?;
    Ok((owner, token))
}

#[derive(Debug)]
pub struct ResetPasswordInput {
    pub owner: Uuid,
    pub token: String,
    pub password: String,
}

pub fn reset_password(req: ResetPasswordRequest) -> ApiResult<ResetPasswordInput> {
    let (owner, token) = token_and_id(VerifyTokenRequest {
        id: req.id,
        token: req.token,
    })?;
    Ok(ResetPasswordInput {
        owner,
        token,
        password: password(req.password)?,
    })
}

pub fn profile_name(value: Option<String>) -> ApiResult<String> {
    let name = required(value, "Name is missing!")?;
    if name.chars().count() < 3 {
        return Err(invalid("Invalid name!"));
    }
    Ok(name)
}

#[derive(Debug)]
pub struct ProductInput {
    pub name: String,
    pub description: String,
    pub category: Category,
    pub price: f64,
    pub purchasing_date: DateTime<Utc>,
}

pub fn product(form: &UploadForm) -> ApiResult<ProductInput> {
    let field = |name: &str| form.field(name).map(str::to_string);

    let name = required(field("name"), "Name is missing!")?;
    let description = required(field("description"), "Description is missing!")?;

    let category = required(field("category"), "Category is missing!")?
        .parse::<Category>()
        .map_err(|_| invalid("Invalid category!"))?;

    let price = required(field("price"), "Price is missing!")?
        .parse::<f64>()
        .ok()
        .filter(|p| p.is_finite() && *p >= 0.0)
        .ok_or_else(|| invalid("Invalid price!"))?;

    let purchasing_date = required(field("purchasingDate"), "Purchasing date is missing!")?;
    let purchasing_date = parse_date(&purchasing_date).ok_or_else(|| invalid("Invalid purchasing date!"))?;

    Ok(ProductInput {
        name,
        description,
        category,
        price,
        purchasing_date,
    })
}

/// RFC 3339, or a bare `YYYY-MM-DD` taken as midnight UTC.
fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// Product images: at most [`MAX_PRODUCT_IMAGES`] in total once the
/// `existing` ones are counted, and each must be an image.
pub fn product_images(files: &[FormFile], existing: usize) -> ApiResult<()> {
    if files.len() + existing > MAX_PRODUCT_IMAGES {
        return Err(invalid("Product can't have more than 5 images!"));
    }
    if files.iter().any(|file| !file.is_image()) {
        return Err(invalid("Invalid image file!"));
    }
    Ok(())
}

/// `(offset, limit)` for a page query. Pages start at 1.
pub fn page(query: &PageQuery) -> (u32, u32) {
    let page_no = query.page_no.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    ((page_no - 1).saturating_mul(limit), limit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn message(err: ApiError) -> String {
        err.to_string()
    }

    #[test]
    fn email_rules() {
        assert_eq!(email(Some(" Ann@X.com ".into())).unwrap(), "ann@x.com");
        assert_eq!(message(email(None).unwrap_err()), "Email is missing!");
        assert_eq!(message(email(Some("ann@x".into())).unwrap_err()), "Invalid email!");
    }

    #[test]
    fn password_rules() {
        assert!(password(Some("Abc12345!".into())).is_ok());
        assert_eq!(message(password(None).unwrap_err()), "Password is missing!");
        assert_eq!(
            message(password(Some("Ab1!".into())).unwrap_err()),
            "Password should be at least 8 chars long!"
        );
        for weak in ["abcdefgh", "abcd1234", "abcdefg!", "12345678!", "Abc 1234!"] {
            assert_eq!(message(password(Some(weak.into())).unwrap_err()), "Password is too simple.");
        }
    }

    #[test]
    fn sign_up_reports_first_failure() {
        let err = sign_up(SignUpRequest {
            name: Some("  ".into()),
            email: Some("bad".into()),
            password: None,
        })
        .unwrap_err();
        assert_eq!(message(err), "Name is missing!");
    }

    #[test]
    fn token_and_id_rules() {
        let err = token_and_id(VerifyTokenRequest {
            id: Some("123".into()),
            token: Some("abc".into()),
        })
        .unwrap_err();
        assert_eq!(message(err), "Invalid user id!");

        let owner = Uuid::new_v4();
        let err = token_and_id(VerifyTokenRequest {
            id: Some(owner.to_string()),
            token: None,
        })
        .unwrap_err();
        assert_eq!(message(err), "Token is missing!");
    }

    #[test]
    fn dates() {
        assert_eq!(
            parse_date("2023-05-01").unwrap().to_rfc3339(),
            "2023-05-01T00:00:00+00:00"
        );
        assert!(parse_date("2023-05-01T10:00:00+02:00").is_some());
        assert!(parse_date("yesterday").is_none());
    }

    #[test]
    fn images_are_capped_and_typed() {
        let file = |ct: &str| FormFile {
            field: "images".into(),
            file_name: "a.jpg".into(),
            content_type: Some(ct.into()),
            bytes: Bytes::from_static(b"x"),
        };

        assert!(product_images(&[file("image/jpeg"), file("image/png")], 3).is_ok());
        assert!(product_images(&[file("image/jpeg"), file("image/png")], 4).is_err());
        assert_eq!(
            message(product_images(&[file("text/plain")], 0).unwrap_err()),
            "Invalid image file!"
        );
    }

    #[test]
    fn pagination_defaults_and_clamps() {
        assert_eq!(page(&PageQuery::default()), (0, 10));
        assert_eq!(
            page(&PageQuery {
                page_no: Some(3),
                limit: Some(5)
            }),
            (10, 5)
        );
        assert_eq!(
            page(&PageQuery {
                page_no: Some(0),
                limit: Some(1000)
            }),
            (0, 100)
        );
        assert_eq!(
            page(&PageQuery {
                page_no: Some(1),
                limit: Some(0)
            }),
            (0, 1)
        );
    }
}
