use std::fmt;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use chrono::NaiveDate;

/// Check letters indexed by `prefix % 23`.
pub const CHECK_LETTERS: &[u8; 23] = b"TRWAGMYFPDXBNJZSQVHLCKE";

pub const STUDIO_NAME_MAX: usize = 20;
pub const ORIGIN_COUNTRY_MAX: usize = 20;
pub const FIRST_NAME_MAX: usize = 15;
pub const SURNAME_MAX: usize = 25;
pub const TITLE_MAX: usize = 20;
pub const GENRE_MAX: usize = 20;

const PHONE_MIN: i64 = 100_000_000;
const PHONE_MAX: i64 = 999_999_999;

const DATE_FORMATS: [&str; 2] = ["%d-%m-%Y", "%Y-%m-%d"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    StudioId,
    StudioName,
    OriginCountry,
    NationalId,
    FirstName,
    Surname,
    Phone,
    MovieId,
    Owner,
    Studio,
    Title,
    Price,
    Duration,
    ReleaseDate,
    Genre,
    Rating,
    Percent,
}

impl Field {
    pub const fn name(self) -> &'static str {
        match self {
            Field::StudioId => "studio id",
            Field::StudioName => "studio name",
            Field::OriginCountry => "origin country",
            Field::NationalId => "national ID",
            Field::FirstName => "first name",
            Field::Surname => "surname",
            Field::Phone => "phone",
            Field::MovieId => "movie id",
            Field::Owner => "owner",
            Field::Studio => "studio",
            Field::Title => "title",
            Field::Price => "price",
            Field::Duration => "duration",
            Field::ReleaseDate => "release date",
            Field::Genre => "genre",
            Field::Rating => "rating",
            Field::Percent => "percent",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Reason {
    #[error("a value is required")]
    Required,
    #[error("max length exceeded ({max} characters)")]
    MaxLengthExceeded { max: usize },
    #[error("not a valid number")]
    NotANumber,
    #[error("not a valid date")]
    NotADate,
    #[error("not a valid national ID (8 digits followed by the check letter)")]
    InvalidNationalId,
    #[error("must be between {min} and {max}")]
    OutOfRange { min: String, max: String },
}

/// Caller input rejected before any storage interaction.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid {field}: {reason}")]
pub struct ValidationError {
    pub field: Field,
    pub reason: Reason,
}

impl ValidationError {
    pub fn new(field: Field, reason: Reason) -> Self {
        Self { field, reason }
    }
}

pub type Validated<T> = std::result::Result<T, ValidationError>;

/// Check letter for an 8-digit national-ID prefix.
pub fn check_letter(prefix: u32) -> char {
    CHECK_LETTERS[(prefix % 23) as usize] as char
}

/// Accepts exactly 8 decimal digits followed by the matching check letter,
/// in either case. Returns the ID with the letter upper-cased.
pub fn national_id(value: &str) -> Validated<String> {
    let invalid = || ValidationError::new(Field::NationalId, Reason::InvalidNationalId);

    if value.len() != 9 || !value.is_ascii() {
        return Err(invalid());
    }
    let (digits, letter) = value.split_at(8);
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    let prefix: u32 = digits.parse().map_err(|_| invalid())?;
    let letter = letter.chars().next().ok_or_else(invalid)?;

    if !letter.eq_ignore_ascii_case(&check_letter(prefix)) {
        return Err(invalid());
    }
    Ok(format!("{}{}", digits, letter.to_ascii_uppercase()))
}

/// Required text bounded by the column width.
pub fn bounded_text(field: Field, value: &str, max: usize) -> Validated<String> {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, Reason::Required));
    }
    if value.chars().count() > max {
        return Err(ValidationError::new(field, Reason::MaxLengthExceeded { max }));
    }
    Ok(value.to_owned())
}

pub fn phone(value: i64) -> Validated<i32> {
    if !(PHONE_MIN..=PHONE_MAX).contains(&value) {
        return Err(ValidationError::new(
            Field::Phone,
            Reason::OutOfRange {
                min: PHONE_MIN.to_string(),
                max: PHONE_MAX.to_string(),
            },
        ));
    }
    i32::try_from(value).map_err(|_| ValidationError::new(Field::Phone, Reason::NotANumber))
}

pub fn rating(value: i64) -> Validated<i16> {
    if !(1..=5).contains(&value) {
        return Err(ValidationError::new(
            Field::Rating,
            Reason::OutOfRange {
                min: "1".to_string(),
                max: "5".to_string(),
            },
        ));
    }
    Ok(value as i16)
}

/// A missing percentage is valid and means "leave the price alone".
pub fn percent(value: Option<BigDecimal>) -> Validated<Option<BigDecimal>> {
    let Some(value) = value else {
        return Ok(None);
    };
    if value < BigDecimal::from(0) || value > BigDecimal::from(100) {
        return Err(ValidationError::new(
            Field::Percent,
            Reason::OutOfRange {
                min: "0".to_string(),
                max: "100".to_string(),
            },
        ));
    }
    Ok(Some(value))
}

pub fn parse_number<T: FromStr>(field: Field, text: &str) -> Validated<T> {
    text.trim()
        .parse()
        .map_err(|_| ValidationError::new(field, Reason::NotANumber))
}

/// Parses `dd-mm-yyyy`, falling back to ISO `yyyy-mm-dd`.
pub fn parse_release_date(text: &str) -> Validated<NaiveDate> {
    let text = text.trim();
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
        .ok_or_else(|| ValidationError::new(Field::ReleaseDate, Reason::NotADate))
}
