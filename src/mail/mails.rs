use super::sendmail::send_email;

/// Mail the single-use signup confirmation code. The code is exchanged for
/// an access token at POST /auth/token.
pub async fn send_confirmation_email(
    to_email: &str,
    username: &str,
    confirmation_code: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let subject = "Your confirmation code";
    let body = format!(
        "Hello, {}.\nYour confirmation code for API access: {}",
        username, confirmation_code
    );

    send_email(to_email, subject, body).await
}
