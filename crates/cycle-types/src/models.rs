use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// -- JWT Claims --

/// Payload of both access and refresh tokens.
///
/// Access tokens carry `exp`; refresh tokens never do. `jti` keeps two tokens
/// minted for the same user in the same second distinct.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub id: Uuid,
    pub jti: Uuid,
    pub iat: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<usize>,
}

// -- Identity --

/// The identity projection attached to authenticated requests.
/// Never carries the password hash or the refresh-token list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub verified: bool,
    pub avatar: Option<String>,
}

/// What other users get to see about someone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicProfile {
    pub id: Uuid,
    pub name: String,
    pub avatar: Option<String>,
}

impl From<&UserProfile> for PublicProfile {
    fn from(profile: &UserProfile) -> Self {
        Self {
            id: profile.id,
            name: profile.name.clone(),
            avatar: profile.avatar.clone(),
        }
    }
}

// -- Products --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Electronics,
    Fashion,
    Fitness,
    #[serde(rename = "Home Appliances")]
    HomeAppliances,
    Kids,
    Mobiles,
    Furniture,
    Laptops,
    Books,
    Toys,
    Shoes,
    Others,
}

impl Category {
    pub const ALL: [Category; 12] = [
        Self::Electronics,
        Self::Fashion,
        Self::Fitness,
        Self::HomeAppliances,
        Self::Kids,
        Self::Mobiles,
        Self::Furniture,
        Self::Laptops,
        Self::Books,
        Self::Toys,
        Self::Shoes,
        Self::Others,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Electronics => "Electronics",
            Self::Fashion => "Fashion",
            Self::Fitness => "Fitness",
            Self::HomeAppliances => "Home Appliances",
            Self::Kids => "Kids",
            Self::Mobiles => "Mobiles",
            Self::Furniture => "Furniture",
            Self::Laptops => "Laptops",
            Self::Books => "Books",
            Self::Toys => "Toys",
            Self::Shoes => "Shoes",
            Self::Others => "Others",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCategory(pub String);

impl fmt::Display for UnknownCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown category '{}'", self.0)
    }
}

impl std::error::Error for UnknownCategory {}

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}

/// An image stored on the external host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRef {
    pub url: String,
    pub id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_parses_wire_names() {
        assert_eq!("Home Appliances".parse::<Category>(), Ok(Category::HomeAppliances));
        assert_eq!("Toys".parse::<Category>(), Ok(Category::Toys));
        assert!("home appliances".parse::<Category>().is_err());
    }

    #[test]
    fn category_serde_matches_display() {
        for category in Category::ALL {
            let json = serde_json::to_string(&category).unwrap();
            assert_eq!(json, format!("\"{}\"", category));
        }
    }

    #[test]
    fn refresh_claims_omit_exp() {
        let claims = Claims {
            id: Uuid::new_v4(),
            jti: Uuid::new_v4(),
            iat: 1,
            exp: None,
        };
        let json = serde_json::to_value(&claims).unwrap();
        assert!(json.get("exp").is_none());
    }
}
