/// Authentication and authorization
///
/// # Modules
///
/// - [`jwt`]: token issuance and validation
/// - [`context`]: the per-request identity derived from a token
/// - [`authorization`]: the role/action access matrix and scoped filters
///
/// # Example
///
/// ```
/// use taskboard_shared::auth::context::AuthContext;
/// use taskboard_shared::auth::jwt::{create_token, validate_token, Claims};
/// use taskboard_shared::models::user::Role;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let secret = "a-secret-of-at-least-thirty-two-bytes";
/// let token = create_token(&Claims::new("u1", Role::User), secret)?;
/// let auth = AuthContext::from(validate_token(&token, secret)?);
/// assert_eq!(auth.role, Role::User);
/// # Ok(())
/// # }
/// ```

pub mod authorization;
pub mod context;
pub mod jwt;
