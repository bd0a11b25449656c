//! Product registration input

use serde::Deserialize;

use super::validation::{optional, required};
use super::ValidationError;

const MAX_NAME_LEN: usize = 200;
const MAX_CRITICALITY_LEN: usize = 50;
const MAX_CATEGORY_LEN: usize = 100;
const MAX_OTHER_LEN: usize = 200;
const MAX_DESCRIPTION_LEN: usize = 10_000;

/// Number of intake questions asked when a product is registered
pub const PROFILE_QUESTIONS: u8 = 10;

/// Category value whose free-text `other` field is kept
pub const OTHER_CATEGORY: &str = "Other";

/// Raw product registration body
#[derive(Debug, Clone, Deserialize)]
pub struct ProductInput {
    pub application_name: String,
    pub product_owner: String,
    pub business_criticality: String,
    pub description: Option<String>,
    #[serde(default)]
    pub profile: Vec<ProfileAnswerInput>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProfileAnswerInput {
    pub position: u8,
    #[serde(default)]
    pub category: String,
    pub description: Option<String>,
    pub other: Option<String>,
}

/// Validated product ready to insert
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProduct {
    pub application_name: String,
    pub product_owner: String,
    pub business_criticality: String,
    pub description: Option<String>,
    pub profile: Vec<ProfileAnswer>,
}

/// One intake answer, position 1..=10
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileAnswer {
    pub position: i16,
    pub category: String,
    pub description: Option<String>,
    pub other: Option<String>,
}

impl NewProduct {
    pub fn new(input: ProductInput) -> Result<Self, ValidationError> {
        let application_name = required("application_name", &input.application_name, MAX_NAME_LEN)?;
        let product_owner = required("product_owner", &input.product_owner, MAX_NAME_LEN)?;
        let business_criticality = required(
            "business_criticality",
            &input.business_criticality,
            MAX_CRITICALITY_LEN,
        )?;
        let description = optional("description", input.description.as_deref(), MAX_DESCRIPTION_LEN)?;

        let mut profile: Vec<ProfileAnswer> = Vec::with_capacity(input.profile.len());
        for answer in input.profile {
            if !(1..=PROFILE_QUESTIONS).contains(&answer.position) {
                return Err(ValidationError::InvalidVariant {
                    field: "profile position",
                    value: answer.position.to_string(),
                });
            }
            let position = i16::from(answer.position);
            if profile.iter().any(|p| p.position == position) {
                return Err(ValidationError::InvalidFormat {
                    field: "profile",
                    reason: "each position may appear only once",
                });
            }

            let category = answer.category.trim().to_string();
            if category.chars().count() > MAX_CATEGORY_LEN {
                return Err(ValidationError::TooLong {
                    field: "profile category",
                    max: MAX_CATEGORY_LEN,
                });
            }
            let other = if category == OTHER_CATEGORY {
                optional("profile other", answer.other.as_deref(), MAX_OTHER_LEN)?
            } else {
                None
            };
            profile.push(ProfileAnswer {
                position,
                category,
                description: optional(
                    "profile description",
                    answer.description.as_deref(),
                    MAX_DESCRIPTION_LEN,
                )?,
                other,
            });
        }
        profile.sort_by_key(|p| p.position);

        Ok(Self {
            application_name,
            product_owner,
            business_criticality,
            description,
            profile,
        })
    }
}
