mod gate;
pub mod password;
pub mod validation;

pub use gate::{AuthGate, FieldErrors, Registration};
pub use password::{hash_password, verify_password};
pub use validation::{
    validate_email, validate_password, validate_repeated_password, ValidationResult,
};
