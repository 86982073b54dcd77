use askama::Template;

#[derive(Template)]
#[template(path = "email/password_reset_code.html")]
struct PasswordResetCodeEmail<'a> {
    name: &'a str,
    code: &'a str,
    expires_in_minutes: i64,
}

/// Names come from user input and are HTML-escaped by the template.
pub fn render_password_reset_code(
    name: &str,
    code: &str,
    expires_in_minutes: i64,
) -> Result<String, askama::Error> {
    PasswordResetCodeEmail {
        name,
        code,
        expires_in_minutes,
    }
    .render()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_email_contains_code_and_window() {
        let html = render_password_reset_code("Ada", "K7M2Q9XZ", 15).unwrap();
        assert!(html.contains("K7M2Q9XZ"));
        assert!(html.contains("15 minutes"));
        assert!(html.contains("Hi Ada"));
    }

    #[test]
    fn reset_email_escapes_name() {
        let html = render_password_reset_code("<script>alert(1)</script>", "K7M2Q9XZ", 15).unwrap();
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }
}
